use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::domain::{CardNumber, TransactionId};

pub const CARD_NUMBER_LENGTH: usize = 16;

/// Source of card numbers and transaction ids.
///
/// The random generator is seeded once, when the generator is built, and is
/// shared by every caller.
#[derive(Debug)]
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic card numbers, for tests and replays.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        TransactionId(Uuid::now_v7())
    }

    /// 16 digits, no leading zero, last digit is the Luhn check digit.
    pub fn card_number(&self) -> CardNumber {
        let mut digits = Vec::with_capacity(CARD_NUMBER_LENGTH);
        {
            let mut rng = self.rng.lock();
            digits.push(rng.gen_range(1..=9u8));
            while digits.len() < CARD_NUMBER_LENGTH - 1 {
                digits.push(rng.gen_range(0..=9u8));
            }
        }
        digits.push(luhn_check_digit(&digits));

        CardNumber(digits.iter().map(|d| char::from(b'0' + d)).collect())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn luhn_check_digit(payload: &[u8]) -> u8 {
    // Doubling starts from the rightmost payload digit.
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

pub fn is_valid_card_number(number: &CardNumber) -> bool {
    let s = number.as_str();
    if s.len() != CARD_NUMBER_LENGTH || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u8> = s.bytes().map(|b| b - b'0').collect();
    let (payload, check) = digits.split_at(CARD_NUMBER_LENGTH - 1);
    luhn_check_digit(payload) == check[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_numbers_are_luhn_valid() {
        let ids = IdGenerator::new();
        for _ in 0..100 {
            let number = ids.card_number();
            assert_eq!(number.as_str().len(), CARD_NUMBER_LENGTH);
            assert!(!number.as_str().starts_with('0'));
            assert!(is_valid_card_number(&number), "{}", number);
        }
    }

    #[test]
    fn known_luhn_numbers() {
        assert!(is_valid_card_number(&CardNumber::from("4111111111111111")));
        assert!(is_valid_card_number(&CardNumber::from("4000000000000002")));
        assert!(!is_valid_card_number(&CardNumber::from("4111111111111112")));
        assert!(!is_valid_card_number(&CardNumber::from("41111111")));
    }

    #[test]
    fn seeded_generators_repeat() {
        let a = IdGenerator::from_seed(7);
        let b = IdGenerator::from_seed(7);
        assert_eq!(a.card_number(), b.card_number());
    }

    #[test]
    fn transaction_ids_sort_by_creation() {
        let ids = IdGenerator::new();
        let generated: Vec<_> = (0..64).map(|_| ids.transaction_id()).collect();
        let mut sorted = generated.clone();
        sorted.sort();
        assert_eq!(generated, sorted);
    }
}
