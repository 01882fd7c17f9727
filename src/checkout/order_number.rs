use chrono::{NaiveDate, Utc};
use rand::Rng;

/// Suffix alphabet without look-alike characters (0/O, 1/I).
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 6;

/// Bounded number of fresh order numbers tried before giving up.
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Source of candidate order numbers. Uniqueness is enforced by the
/// `orders.order_number` constraint, not by the source.
pub trait OrderNumberSource: Send + Sync {
    fn next_order_number(&self) -> String;
}

pub fn format_order_number(prefix: &str, date: NaiveDate, suffix: &str) -> String {
    format!("{prefix}-{}-{suffix}", date.format("%Y%m%d"))
}

/// `PREFIX-YYYYMMDD-XXXXXX` with a random six character suffix.
#[derive(Debug, Clone)]
pub struct RandomOrderNumbers {
    prefix: String,
}

impl RandomOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl OrderNumberSource for RandomOrderNumbers {
    fn next_order_number(&self) -> String {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
            .collect();
        format_order_number(&self.prefix, Utc::now().date_naive(), &suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prefix_date_and_suffix() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_order_number("ORD", date, "K7QX2M"), "ORD-20250307-K7QX2M");
    }

    #[test]
    fn random_numbers_have_the_expected_shape() {
        let source = RandomOrderNumbers::new("SHOP");
        let number = source.next_order_number();
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SHOP");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn consecutive_numbers_differ() {
        let source = RandomOrderNumbers::new("ORD");
        assert_ne!(source.next_order_number(), source.next_order_number());
    }
}
