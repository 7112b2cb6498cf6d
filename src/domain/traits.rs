use std::future::Future;

use futures::Stream;

use crate::domain::{
    Card, CardNumber, Command, Error, Merchant, MerchantId, Spending, Transaction, TransactionId,
};

pub trait CommandStream {
    type CmdStream: Stream<Item = Result<Command, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::CmdStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

/// A persistence backend able to run atomic units of work over cards,
/// merchants and transactions.
pub trait LedgerStore: Send + Sync {
    type Unit: LedgerUnit;

    fn begin(&self) -> impl Future<Output = Result<Self::Unit, Error>> + Send;
}

/// One all-or-nothing unit of work.
///
/// `lock_*` reads take an exclusive row lock held until the unit commits or is
/// dropped. Writes are staged and only become visible on `commit`; dropping
/// the unit discards them.
pub trait LedgerUnit: Send {
    fn lock_card(
        &mut self,
        card_number: &CardNumber,
    ) -> impl Future<Output = Result<Card, Error>> + Send;

    fn lock_transaction(
        &mut self,
        transaction_id: &TransactionId,
    ) -> impl Future<Output = Result<Transaction, Error>> + Send;

    /// Latest committed card without keeping a lock.
    fn card(
        &mut self,
        card_number: &CardNumber,
    ) -> impl Future<Output = Result<Card, Error>> + Send;

    fn transaction(
        &mut self,
        transaction_id: &TransactionId,
    ) -> impl Future<Output = Result<Transaction, Error>> + Send;

    fn merchant(
        &mut self,
        merchant_id: &MerchantId,
    ) -> impl Future<Output = Result<Merchant, Error>> + Send;

    fn card_exists(
        &mut self,
        card_number: &CardNumber,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Spending history of a card, newest authorization first.
    fn spending(
        &mut self,
        card_number: &CardNumber,
    ) -> impl Future<Output = Result<Vec<Spending>, Error>> + Send;

    fn insert_card(&mut self, card: Card) -> Result<(), Error>;

    fn insert_merchant(&mut self, merchant: Merchant) -> Result<(), Error>;

    fn insert_transaction(&mut self, transaction: Transaction) -> Result<(), Error>;

    /// The card must have been read with `lock_card` in this unit.
    fn update_card(&mut self, card: Card) -> Result<(), Error>;

    /// The transaction must have been read with `lock_transaction` in this unit.
    fn update_transaction(&mut self, transaction: Transaction) -> Result<(), Error>;

    fn commit(self) -> impl Future<Output = Result<(), Error>> + Send;
}
