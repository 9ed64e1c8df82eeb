//! National identifier checksum
//!
//! An identifier is 11 ASCII digits: nine base digits followed by two check
//! digits. Each check digit is a weighted sum over the preceding digits,
//! reduced with `(sum * 10) % 11`, where a remainder of 10 counts as 0.

/// Number of digits in a normalized identifier.
pub const NATIONAL_ID_LEN: usize = 11;

/// Return true if `id` is exactly 11 ASCII digits with valid check digits.
///
/// Identifiers made of a single repeated digit (`00000000000`,
/// `11111111111`, ...) satisfy the arithmetic but are never issued, so they
/// are rejected.
pub fn is_valid_national_id(id: &str) -> bool {
    let Some(digits) = to_digits(id) else {
        return false;
    };

    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Compute both check digits for nine base digits.
///
/// Returns `None` unless `base` is exactly nine ASCII digits.
pub fn check_digits(base: &str) -> Option<(u8, u8)> {
    if base.len() != 9 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digits: Vec<u8> = base.bytes().map(|b| b - b'0').collect();
    let first = check_digit(&digits);
    digits.push(first);
    let second = check_digit(&digits);

    Some((first, second))
}

fn to_digits(id: &str) -> Option<[u8; NATIONAL_ID_LEN]> {
    let bytes = id.as_bytes();
    if bytes.len() != NATIONAL_ID_LEN {
        return None;
    }

    let mut digits = [0u8; NATIONAL_ID_LEN];
    for (slot, &b) in digits.iter_mut().zip(bytes) {
        if !b.is_ascii_digit() {
            return None;
        }
        *slot = b - b'0';
    }

    Some(digits)
}

/// Weighted checksum over `digits`; the weight of position `i` is `len + 1 - i`.
fn check_digit(digits: &[u8]) -> u8 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * (top - i as u32))
        .sum();

    match (sum * 10) % 11 {
        10 => 0,
        r => r as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const VALID: &str = "52998224725";

    fn flip(id: &str, pos: usize) -> String {
        let mut bytes = id.as_bytes().to_vec();
        bytes[pos] = b'0' + (bytes[pos] - b'0' + 1) % 10;
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_known_valid_identifiers() {
        assert!(is_valid_national_id(VALID));
        assert!(is_valid_national_id("11144477735"));
        assert!(is_valid_national_id("04109164125"));
    }

    #[test]
    fn test_flipped_check_digits_are_invalid() {
        assert!(!is_valid_national_id(&flip(VALID, 9)));
        assert!(!is_valid_national_id(&flip(VALID, 10)));
    }

    #[test]
    fn test_repeated_digits_are_invalid() {
        for d in 0..=9 {
            let id = d.to_string().repeat(11);
            assert!(!is_valid_national_id(&id), "{id} should be invalid");
        }
    }

    #[test]
    fn test_wrong_length_is_invalid() {
        assert!(!is_valid_national_id(""));
        assert!(!is_valid_national_id("5299822472"));
        assert!(!is_valid_national_id("529982247250"));
    }

    #[test]
    fn test_non_digits_are_invalid() {
        assert!(!is_valid_national_id("529.982.247"));
        assert!(!is_valid_national_id("5299822472a"));
    }

    #[test]
    fn test_check_digits() {
        assert_eq!(check_digits("529982247"), Some((2, 5)));
        assert_eq!(check_digits("111444777"), Some((3, 5)));
        assert_eq!(check_digits("12345678"), None);
        assert_eq!(check_digits("12345678x"), None);
    }

    proptest! {
        #[test]
        fn prop_wrong_length_never_valid(s in "[0-9]{0,30}") {
            prop_assume!(s.len() != NATIONAL_ID_LEN);
            prop_assert!(!is_valid_national_id(&s));
        }

        #[test]
        fn prop_generated_identifiers_validate(base in "[0-9]{9}") {
            let (first, second) = check_digits(&base).unwrap();
            let id = format!("{base}{first}{second}");
            let repeated = id.bytes().all(|b| b == id.as_bytes()[0]);
            prop_assert_eq!(is_valid_national_id(&id), !repeated);
        }

        #[test]
        fn prop_flipping_second_check_digit_invalidates(base in "[0-9]{9}") {
            let (first, second) = check_digits(&base).unwrap();
            let id = format!("{base}{first}{second}");
            prop_assert!(!is_valid_national_id(&flip(&id, 10)));
        }
    }
}
