use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::{
    Card, CardNumber, Error, LedgerStore, LedgerUnit, Merchant, MerchantId, Spending, Transaction,
    TransactionId,
};

type Row<T> = Arc<Mutex<T>>;

#[derive(Debug, Default)]
struct Tables {
    cards: HashMap<CardNumber, Row<Card>>,
    merchants: HashMap<MerchantId, Merchant>,
    transactions: HashMap<TransactionId, Row<Transaction>>,
    card_transactions: HashMap<CardNumber, Vec<TransactionId>>,
}

/// In-process ledger storage with row-level locking.
///
/// Every card and transaction row sits behind its own async mutex. A unit
/// holds the mutex of each row it read for update until it commits or is
/// dropped, so units touching the same card run one after the other while
/// units on different cards never wait on each other. The table map lock is
/// only held for lookups and inserts, never across a row lock wait.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    lock_timeout: Duration,
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            lock_timeout,
        }
    }
}

impl LedgerStore for InMemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, Error> {
        Ok(MemoryUnit {
            tables: Arc::clone(&self.tables),
            lock_timeout: self.lock_timeout,
            locked_cards: HashMap::new(),
            locked_transactions: HashMap::new(),
            card_updates: HashMap::new(),
            transaction_updates: HashMap::new(),
            new_cards: Vec::new(),
            new_merchants: Vec::new(),
            new_transactions: Vec::new(),
        })
    }
}

pub struct MemoryUnit {
    tables: Arc<RwLock<Tables>>,
    lock_timeout: Duration,
    locked_cards: HashMap<CardNumber, OwnedMutexGuard<Card>>,
    locked_transactions: HashMap<TransactionId, OwnedMutexGuard<Transaction>>,
    card_updates: HashMap<CardNumber, Card>,
    transaction_updates: HashMap<TransactionId, Transaction>,
    new_cards: Vec<Card>,
    new_merchants: Vec<Merchant>,
    new_transactions: Vec<Transaction>,
}

impl MemoryUnit {
    async fn card_row(&self, card_number: &CardNumber) -> Result<Row<Card>, Error> {
        let tables = self.tables.read().await;
        tables
            .cards
            .get(card_number)
            .cloned()
            .ok_or_else(|| Error::not_found("card", card_number))
    }

    async fn transaction_row(&self, transaction_id: &TransactionId) -> Result<Row<Transaction>, Error> {
        let tables = self.tables.read().await;
        tables
            .transactions
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| Error::not_found("transaction", transaction_id))
    }

    async fn acquire<T>(&self, row: Row<T>, what: &str) -> Result<OwnedMutexGuard<T>, Error> {
        tokio::time::timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| self.timed_out(what))
    }

    fn timed_out(&self, what: &str) -> Error {
        tracing::warn!(lock = what, timeout = ?self.lock_timeout, "lock wait timed out");
        Error::StorageConflict(format!(
            "timed out after {:?} waiting for {}",
            self.lock_timeout, what
        ))
    }

    /// Row-level constraints, checked before anything is applied.
    fn check_constraints(&self) -> Result<(), Error> {
        for card in self.new_cards.iter().chain(self.card_updates.values()) {
            card.check_invariants()?;
        }
        for transaction in self.new_transactions.iter().chain(self.transaction_updates.values()) {
            transaction.check_invariants()?;
        }
        Ok(())
    }

    /// Primary and foreign key checks for staged inserts.
    fn check_keys(&self, tables: &Tables) -> Result<(), Error> {
        for card in &self.new_cards {
            if tables.cards.contains_key(&card.card_number) {
                return Err(Error::already_exists("card", &card.card_number));
            }
        }
        for merchant in &self.new_merchants {
            if tables.merchants.contains_key(&merchant.id) {
                return Err(Error::already_exists("merchant", &merchant.id));
            }
        }
        for transaction in &self.new_transactions {
            if tables.transactions.contains_key(&transaction.id) {
                return Err(Error::already_exists("transaction", transaction.id));
            }
            let card_known = tables.cards.contains_key(&transaction.card_id)
                || self.new_cards.iter().any(|c| c.card_number == transaction.card_id);
            if !card_known {
                return Err(Error::not_found("card", &transaction.card_id));
            }
            let merchant_known = tables.merchants.contains_key(&transaction.merchant_id)
                || self.new_merchants.iter().any(|m| m.id == transaction.merchant_id);
            if !merchant_known {
                return Err(Error::not_found("merchant", &transaction.merchant_id));
            }
        }
        Ok(())
    }

    /// Writes staged updates through the held row guards. Other units only
    /// see the new values once the guards are released.
    fn apply_updates(&mut self) {
        for (number, card) in self.card_updates.drain() {
            if let Some(guard) = self.locked_cards.get_mut(&number) {
                **guard = card;
            }
        }
        for (id, transaction) in self.transaction_updates.drain() {
            if let Some(guard) = self.locked_transactions.get_mut(&id) {
                **guard = transaction;
            }
        }
    }

    fn has_inserts(&self) -> bool {
        !(self.new_cards.is_empty() && self.new_merchants.is_empty() && self.new_transactions.is_empty())
    }
}

impl LedgerUnit for MemoryUnit {
    async fn lock_card(&mut self, card_number: &CardNumber) -> Result<Card, Error> {
        if let Some(card) = self.card_updates.get(card_number) {
            return Ok(card.clone());
        }
        if let Some(guard) = self.locked_cards.get(card_number) {
            return Ok((**guard).clone());
        }

        let row = self.card_row(card_number).await?;
        let guard = self.acquire(row, "card").await?;
        let card = (*guard).clone();
        self.locked_cards.insert(card_number.clone(), guard);
        Ok(card)
    }

    async fn lock_transaction(&mut self, transaction_id: &TransactionId) -> Result<Transaction, Error> {
        if let Some(transaction) = self.transaction_updates.get(transaction_id) {
            return Ok(transaction.clone());
        }
        if let Some(guard) = self.locked_transactions.get(transaction_id) {
            return Ok((**guard).clone());
        }

        let row = self.transaction_row(transaction_id).await?;
        let guard = self.acquire(row, "transaction").await?;
        let transaction = (*guard).clone();
        self.locked_transactions.insert(*transaction_id, guard);
        Ok(transaction)
    }

    async fn card(&mut self, card_number: &CardNumber) -> Result<Card, Error> {
        if self.locked_cards.contains_key(card_number) {
            return self.lock_card(card_number).await;
        }
        let row = self.card_row(card_number).await?;
        let guard = self.acquire(row, "card").await?;
        Ok((*guard).clone())
    }

    async fn transaction(&mut self, transaction_id: &TransactionId) -> Result<Transaction, Error> {
        if self.locked_transactions.contains_key(transaction_id) {
            return self.lock_transaction(transaction_id).await;
        }
        let row = self.transaction_row(transaction_id).await?;
        let guard = self.acquire(row, "transaction").await?;
        Ok((*guard).clone())
    }

    async fn merchant(&mut self, merchant_id: &MerchantId) -> Result<Merchant, Error> {
        let tables = self.tables.read().await;
        tables
            .merchants
            .get(merchant_id)
            .cloned()
            .ok_or_else(|| Error::not_found("merchant", merchant_id))
    }

    async fn card_exists(&mut self, card_number: &CardNumber) -> Result<bool, Error> {
        let tables = self.tables.read().await;
        Ok(tables.cards.contains_key(card_number))
    }

    async fn spending(&mut self, card_number: &CardNumber) -> Result<Vec<Spending>, Error> {
        let (rows, merchants) = {
            let tables = self.tables.read().await;
            let rows: Vec<(TransactionId, Row<Transaction>)> = tables
                .card_transactions
                .get(card_number)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| tables.transactions.get(id).map(|row| (*id, row.clone())))
                        .collect()
                })
                .unwrap_or_default();
            (rows, tables.merchants.clone())
        };

        let mut list = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            let transaction = if self.locked_transactions.contains_key(&id) {
                self.lock_transaction(&id).await?
            } else {
                let guard = self.acquire(row, "transaction").await?;
                (*guard).clone()
            };

            let merchant = merchants
                .get(&transaction.merchant_id)
                .ok_or_else(|| Error::not_found("merchant", &transaction.merchant_id))?;
            list.push(Spending::new(&transaction, merchant));
        }

        list.sort_by(|a, b| {
            b.time
                .cmp(&a.time)
                .then_with(|| b.transaction_id.cmp(&a.transaction_id))
        });
        Ok(list)
    }

    fn insert_card(&mut self, card: Card) -> Result<(), Error> {
        if self.new_cards.iter().any(|c| c.card_number == card.card_number) {
            return Err(Error::already_exists("card", &card.card_number));
        }
        self.new_cards.push(card);
        Ok(())
    }

    fn insert_merchant(&mut self, merchant: Merchant) -> Result<(), Error> {
        if self.new_merchants.iter().any(|m| m.id == merchant.id) {
            return Err(Error::already_exists("merchant", &merchant.id));
        }
        self.new_merchants.push(merchant);
        Ok(())
    }

    fn insert_transaction(&mut self, transaction: Transaction) -> Result<(), Error> {
        if self.new_transactions.iter().any(|t| t.id == transaction.id) {
            return Err(Error::already_exists("transaction", transaction.id));
        }
        self.new_transactions.push(transaction);
        Ok(())
    }

    fn update_card(&mut self, card: Card) -> Result<(), Error> {
        if !self.locked_cards.contains_key(&card.card_number) {
            return Err(Error::StorageConflict(format!(
                "card {} updated without holding its lock",
                card.card_number
            )));
        }
        self.card_updates.insert(card.card_number.clone(), card);
        Ok(())
    }

    fn update_transaction(&mut self, transaction: Transaction) -> Result<(), Error> {
        if !self.locked_transactions.contains_key(&transaction.id) {
            return Err(Error::StorageConflict(format!(
                "transaction {} updated without holding its lock",
                transaction.id
            )));
        }
        self.transaction_updates.insert(transaction.id, transaction);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), Error> {
        self.check_constraints()?;

        let cards = self.card_updates.len() + self.new_cards.len();
        let transactions = self.transaction_updates.len() + self.new_transactions.len();

        if self.has_inserts() {
            let shared = Arc::clone(&self.tables);
            let mut tables = tokio::time::timeout(self.lock_timeout, shared.write())
                .await
                .map_err(|_| self.timed_out("tables"))?;
            self.check_keys(&tables)?;

            for card in self.new_cards.drain(..) {
                tables
                    .cards
                    .insert(card.card_number.clone(), Arc::new(Mutex::new(card)));
            }
            for merchant in self.new_merchants.drain(..) {
                tables.merchants.insert(merchant.id.clone(), merchant);
            }
            for transaction in self.new_transactions.drain(..) {
                tables
                    .card_transactions
                    .entry(transaction.card_id.clone())
                    .or_default()
                    .push(transaction.id);
                tables
                    .transactions
                    .insert(transaction.id, Arc::new(Mutex::new(transaction)));
            }
        }
        self.apply_updates();

        tracing::debug!(cards, transactions, "unit committed");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn commit_gives_up_when_tables_stay_busy() {
        let store = InMemoryStore::new(Duration::from_millis(50));
        let number = CardNumber::from("4111111111111111");

        let mut unit = store.begin().await.unwrap();
        unit.insert_card(Card::new(number.clone(), Utc::now())).unwrap();

        let reader = store.tables.read().await;
        let err = unit.commit().await.unwrap_err();
        assert!(matches!(err, Error::StorageConflict(_)));
        assert!(err.is_retryable());
        drop(reader);

        let mut unit = store.begin().await.unwrap();
        assert!(!unit.card_exists(&number).await.unwrap());
    }
}
