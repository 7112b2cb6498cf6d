use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Card, CardNumber, Error, Merchant, MerchantId, Money};

/// Time-ordered transaction identifier (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::str::FromStr for TransactionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::not_found("transaction", s))
    }
}

/// A hold placed on a card by an authorization.
///
/// `authorized_amount` only ever shrinks; `captured_amount` grows on capture
/// and shrinks on refund. Their sum never exceeds `original_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub card_id: CardNumber,
    pub merchant_id: MerchantId,
    pub original_amount: Money,
    pub authorized_amount: Money,
    pub captured_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Opens a hold of `amount` on `card`. Returns the new transaction and the
    /// card with the hold applied; both must be persisted together.
    pub fn authorize(
        id: TransactionId,
        card: &Card,
        merchant: &Merchant,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Card), Error> {
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }
        let card = card.place_hold(amount, now)?;

        let transaction = Transaction {
            id,
            card_id: card.card_number.clone(),
            merchant_id: merchant.id.clone(),
            original_amount: amount,
            authorized_amount: amount,
            captured_amount: Money::ZERO,
            created_at: now,
            updated_at: now,
        };

        Ok((transaction, card))
    }

    /// Settles `amount` of the open hold.
    pub fn capture(
        &self,
        card: &Card,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Card), Error> {
        self.ensure_card(card)?;
        self.ensure_authorized(amount)?;

        let card = card.settle_hold(amount, now)?;
        let transaction = Transaction {
            authorized_amount: Money(self.authorized_amount.0 - amount.0),
            captured_amount: Money(self.captured_amount.0 + amount.0),
            updated_at: now,
            ..self.clone()
        };

        Ok((transaction, card))
    }

    /// Releases `amount` of the open hold without settling it.
    pub fn reverse(
        &self,
        card: &Card,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Card), Error> {
        self.ensure_card(card)?;
        self.ensure_authorized(amount)?;

        let card = card.release_hold(amount, now)?;
        let transaction = Transaction {
            authorized_amount: Money(self.authorized_amount.0 - amount.0),
            updated_at: now,
            ..self.clone()
        };

        Ok((transaction, card))
    }

    /// Gives back `amount` of the captured funds. A zero refund is accepted.
    pub fn refund(
        &self,
        card: &Card,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Card), Error> {
        self.ensure_card(card)?;
        if amount.is_negative() || amount > self.captured_amount {
            return Err(Error::InvalidCapturedAmount {
                requested: amount,
                captured: self.captured_amount,
            });
        }

        let card = card.return_funds(amount, now)?;
        let transaction = Transaction {
            captured_amount: Money(self.captured_amount.0 - amount.0),
            updated_at: now,
            ..self.clone()
        };

        Ok((transaction, card))
    }

    /// No capture or reverse is possible once the hold is exhausted.
    pub fn is_closed(&self) -> bool {
        self.authorized_amount == Money::ZERO
    }

    pub fn check_invariants(&self) -> Result<(), Error> {
        let open_and_captured = self
            .authorized_amount
            .checked_add(self.captured_amount)
            .ok_or_else(|| Error::InvariantViolation(format!("amount overflow on transaction {}", self.id)))?;

        if self.authorized_amount.is_negative()
            || self.captured_amount.is_negative()
            || open_and_captured > self.original_amount
        {
            return Err(Error::InvariantViolation(format!(
                "transaction {} has original {}, authorized {}, captured {}",
                self.id, self.original_amount, self.authorized_amount, self.captured_amount
            )));
        }
        Ok(())
    }

    fn ensure_authorized(&self, amount: Money) -> Result<(), Error> {
        if !amount.is_positive() || amount > self.authorized_amount {
            return Err(Error::InvalidAuthorizedAmount {
                requested: amount,
                authorized: self.authorized_amount,
            });
        }
        Ok(())
    }

    fn ensure_card(&self, card: &Card) -> Result<(), Error> {
        if card.card_number != self.card_id {
            return Err(Error::InvariantViolation(format!(
                "transaction {} belongs to card {}, not {}",
                self.id, self.card_id, card.card_number
            )));
        }
        Ok(())
    }
}

/// One row of a card's spending history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spending {
    pub card_number: CardNumber,
    pub transaction_id: TransactionId,
    pub merchant_type: String,
    pub merchant_name: String,
    pub original_amount: Money,
    pub authorized_amount: Money,
    pub captured_amount: Money,
    pub time: DateTime<Utc>,
}

impl Spending {
    pub fn new(transaction: &Transaction, merchant: &Merchant) -> Self {
        Self {
            card_number: transaction.card_id.clone(),
            transaction_id: transaction.id,
            merchant_type: merchant.kind.clone(),
            merchant_name: merchant.name.clone(),
            original_amount: transaction.original_amount,
            authorized_amount: transaction.authorized_amount,
            captured_amount: transaction.captured_amount,
            time: transaction.created_at,
        }
    }
}
