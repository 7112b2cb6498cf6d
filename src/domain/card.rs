use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Error, Money};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardNumber(pub String);

impl CardNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CardNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardNumber {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A prepaid card. Values are never mutated in place: every balance
/// transition returns the next version of the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_number: CardNumber,
    pub full_balance: Money,    // funds owned by the cardholder
    pub blocked_balance: Money, // funds held by open authorizations
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(card_number: CardNumber, now: DateTime<Utc>) -> Self {
        Self {
            card_number,
            full_balance: Money::ZERO,
            blocked_balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn spendable(&self) -> Money {
        Money(self.full_balance.0 - self.blocked_balance.0)
    }

    /// `0 <= blocked_balance <= full_balance`
    pub fn check_invariants(&self) -> Result<(), Error> {
        if self.blocked_balance.is_negative() || self.blocked_balance > self.full_balance {
            return Err(Error::InvariantViolation(format!(
                "card {} has full balance {} and blocked balance {}",
                self.card_number, self.full_balance, self.blocked_balance
            )));
        }
        Ok(())
    }

    pub fn load_funds(&self, amount: Money, now: DateTime<Utc>) -> Result<Card, Error> {
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }
        let full_balance = self
            .full_balance
            .checked_add(amount)
            .ok_or(Error::InvalidAmount(amount))?;

        Ok(Card {
            full_balance,
            updated_at: now,
            ..self.clone()
        })
    }

    pub(crate) fn place_hold(&self, amount: Money, now: DateTime<Utc>) -> Result<Card, Error> {
        if !amount.is_positive() {
            return Err(Error::InvalidAmount(amount));
        }
        if amount > self.spendable() {
            return Err(Error::InsufficientBalance {
                requested: amount,
                spendable: self.spendable(),
            });
        }

        Ok(Card {
            blocked_balance: self.blocked_balance.checked_add(amount).ok_or_else(|| {
                Error::InvariantViolation(format!("blocked balance overflow on card {}", self.card_number))
            })?,
            updated_at: now,
            ..self.clone()
        })
    }

    pub(crate) fn release_hold(&self, amount: Money, now: DateTime<Utc>) -> Result<Card, Error> {
        let blocked_balance = self.reduce_blocked(amount)?;

        Ok(Card {
            blocked_balance,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Moves `amount` out of both the blocked and the full balance.
    pub(crate) fn settle_hold(&self, amount: Money, now: DateTime<Utc>) -> Result<Card, Error> {
        let blocked_balance = self.reduce_blocked(amount)?;
        let full_balance = self.full_balance.checked_sub(amount).ok_or_else(|| {
            Error::InvariantViolation(format!("full balance underflow on card {}", self.card_number))
        })?;

        Ok(Card {
            full_balance,
            blocked_balance,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Returns previously settled funds to the spendable pool.
    pub(crate) fn return_funds(&self, amount: Money, now: DateTime<Utc>) -> Result<Card, Error> {
        let full_balance = self.full_balance.checked_add(amount).ok_or_else(|| {
            Error::InvariantViolation(format!("full balance overflow on card {}", self.card_number))
        })?;

        Ok(Card {
            full_balance,
            updated_at: now,
            ..self.clone()
        })
    }

    fn reduce_blocked(&self, amount: Money) -> Result<Money, Error> {
        if amount.is_negative() || amount > self.blocked_balance {
            return Err(Error::InvariantViolation(format!(
                "cannot release {} from blocked balance {} on card {}",
                amount, self.blocked_balance, self.card_number
            )));
        }
        Ok(Money(self.blocked_balance.0 - amount.0))
    }
}
