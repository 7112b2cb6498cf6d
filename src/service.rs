use chrono::Utc;
use tracing::Level;

use crate::config::Config;
use crate::domain::{
    Card, CardNumber, Error, LedgerStore, LedgerUnit, Merchant, MerchantId, Money, Spending,
    Transaction, TransactionId,
};
use crate::ids::IdGenerator;

/// Entry point of the ledger. Every public operation runs as exactly one
/// store unit: read the rows it needs, validate, write, commit.
#[derive(Debug)]
pub struct LedgerService<S>
where
    S: LedgerStore,
{
    store: S,
    ids: IdGenerator,
    card_number_attempts: u32,
}

impl<S> LedgerService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, config: &Config) -> Self {
        Self::with_ids(store, IdGenerator::new(), config)
    }

    pub fn with_ids(store: S, ids: IdGenerator, config: &Config) -> Self {
        Self {
            store,
            ids,
            card_number_attempts: config.card_number_attempts,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn create_card(&self) -> Result<Card, Error> {
        for attempt in 1..=self.card_number_attempts {
            let card = Card::new(self.ids.card_number(), Utc::now());

            let mut unit = self.store.begin().await?;
            if unit.card_exists(&card.card_number).await? {
                tracing::debug!(attempt, "card number already taken");
                continue;
            }
            unit.insert_card(card.clone())?;

            match unit.commit().await {
                Ok(()) => {
                    tracing::info!(card = %card.card_number, "card created");
                    return Ok(card);
                }
                // lost a race for the same number
                Err(Error::AlreadyExists { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::Generation(format!(
            "no unused card number after {} attempts",
            self.card_number_attempts
        )))
    }

    pub async fn get_card(&self, card_number: &CardNumber) -> Result<Card, Error> {
        let mut unit = self.store.begin().await?;
        unit.card(card_number).await
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn load_funds(&self, card_number: &CardNumber, amount: Money) -> Result<Card, Error> {
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }

        let mut unit = self.store.begin().await?;
        let card = unit.lock_card(card_number).await?;
        let card = card.load_funds(amount, Utc::now())?;
        unit.update_card(card.clone())?;
        unit.commit().await?;

        tracing::info!(full_balance = %card.full_balance, "funds loaded");
        Ok(card)
    }

    #[tracing::instrument(skip(self, merchant), fields(merchant = %merchant.id), err(level = Level::WARN))]
    pub async fn create_merchant(&self, merchant: Merchant) -> Result<Merchant, Error> {
        let now = Utc::now();
        let merchant = Merchant {
            created_at: now,
            updated_at: now,
            ..merchant
        };

        let mut unit = self.store.begin().await?;
        unit.insert_merchant(merchant.clone())?;
        unit.commit().await?;
        Ok(merchant)
    }

    /// Inserts reference merchants, leaving already present ones untouched.
    pub async fn seed_merchants(&self, merchants: &[Merchant]) -> Result<usize, Error> {
        let mut created = 0;
        for merchant in merchants {
            match self.create_merchant(merchant.clone()).await {
                Ok(_) => created += 1,
                Err(Error::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(created, "merchants seeded");
        Ok(created)
    }

    pub async fn get_merchant(&self, merchant_id: &MerchantId) -> Result<Merchant, Error> {
        let mut unit = self.store.begin().await?;
        unit.merchant(merchant_id).await
    }

    pub async fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Transaction, Error> {
        let mut unit = self.store.begin().await?;
        unit.transaction(transaction_id).await
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn authorize(
        &self,
        card_number: &CardNumber,
        merchant_id: &MerchantId,
        amount: Money,
    ) -> Result<Transaction, Error> {
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }

        let mut unit = self.store.begin().await?;
        let merchant = unit.merchant(merchant_id).await?;
        let card = unit.lock_card(card_number).await?;

        let (transaction, card) =
            Transaction::authorize(self.ids.transaction_id(), &card, &merchant, amount, Utc::now())?;
        unit.update_card(card.clone())?;
        unit.insert_transaction(transaction.clone())?;
        unit.commit().await?;

        tracing::info!(
            transaction = %transaction.id,
            blocked_balance = %card.blocked_balance,
            "hold placed"
        );
        Ok(transaction)
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn capture(&self, transaction_id: &TransactionId, amount: Money) -> Result<Transaction, Error> {
        let mut unit = self.store.begin().await?;
        let (transaction, card) = lock_hold(&mut unit, transaction_id).await?;

        let (transaction, card) = transaction.capture(&card, amount, Utc::now())?;
        commit_hold(unit, &transaction, &card).await?;

        tracing::info!(
            authorized = %transaction.authorized_amount,
            captured = %transaction.captured_amount,
            "hold captured"
        );
        Ok(transaction)
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn reverse(&self, transaction_id: &TransactionId, amount: Money) -> Result<Transaction, Error> {
        let mut unit = self.store.begin().await?;
        let (transaction, card) = lock_hold(&mut unit, transaction_id).await?;

        let (transaction, card) = transaction.reverse(&card, amount, Utc::now())?;
        commit_hold(unit, &transaction, &card).await?;

        tracing::info!(authorized = %transaction.authorized_amount, "hold reversed");
        Ok(transaction)
    }

    #[tracing::instrument(skip(self), err(level = Level::WARN))]
    pub async fn refund(&self, transaction_id: &TransactionId, amount: Money) -> Result<Transaction, Error> {
        let mut unit = self.store.begin().await?;
        let (transaction, card) = lock_hold(&mut unit, transaction_id).await?;

        let (transaction, card) = transaction.refund(&card, amount, Utc::now())?;
        commit_hold(unit, &transaction, &card).await?;

        tracing::info!(captured = %transaction.captured_amount, "captured funds refunded");
        Ok(transaction)
    }

    /// Newest authorization first. A card without history, known or not,
    /// yields an empty list.
    pub async fn transaction_list(&self, card_number: &CardNumber) -> Result<Vec<Spending>, Error> {
        let mut unit = self.store.begin().await?;
        unit.spending(card_number).await
    }
}

/// Locks a transaction and then its card. Always in that order, so two units
/// working on the same hold cannot deadlock.
async fn lock_hold<U>(unit: &mut U, transaction_id: &TransactionId) -> Result<(Transaction, Card), Error>
where
    U: LedgerUnit,
{
    let transaction = unit.lock_transaction(transaction_id).await?;
    let card = unit.lock_card(&transaction.card_id).await?;
    Ok((transaction, card))
}

async fn commit_hold<U>(mut unit: U, transaction: &Transaction, card: &Card) -> Result<(), Error>
where
    U: LedgerUnit,
{
    unit.update_transaction(transaction.clone())?;
    unit.update_card(card.clone())?;
    unit.commit().await
}
