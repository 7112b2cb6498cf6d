//! Prepaid card ledger.
//!
//! Cards carry a full and a blocked balance; transactions are holds placed on
//! a card by an authorization and later captured, reversed or refunded. Every
//! operation of [`LedgerService`] runs as one atomic unit of a
//! [`LedgerStore`], and the store locks the rows it touches so concurrent
//! requests against one card can never overdraw it.

pub mod config;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ids;
pub mod ingestion;
pub mod service;
pub mod store;

pub use config::Config;
pub use domain::{
    Card, CardNumber, Error, LedgerStore, LedgerUnit, Merchant, MerchantId, Money, Spending,
    Transaction, TransactionId,
};
pub use ids::IdGenerator;
pub use service::LedgerService;
pub use store::InMemoryStore;
