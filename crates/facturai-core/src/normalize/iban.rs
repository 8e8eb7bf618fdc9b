//! IBAN clean-up and checksum validation.

/// Remove spaces and separators and upper-case the IBAN.
pub fn compact_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Validate an IBAN using the ISO 13616 mod-97 checksum.
///
/// Algorithm:
/// 1. Move first 4 characters to the end
/// 2. Replace letters with numbers (A=10, B=11, ..., Z=35)
/// 3. The resulting number mod 97 should equal 1
pub fn validate_iban(iban: &str) -> bool {
    let iban = compact_iban(iban);

    // Shortest national format (Norway) is 15 characters, longest 34
    if iban.len() < 15 || iban.len() > 34 {
        return false;
    }

    let country_code = &iban[..2];
    let check_digits = &iban[2..4];

    if !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    if !check_digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let rearranged = format!("{}{}", &iban[4..], &iban[..4]);

    // Fold digit by digit; the full number does not fit in u64
    let mut remainder: u32 = 0;
    for c in rearranged.chars() {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }

    remainder == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compact_iban() {
        assert_eq!(
            compact_iban("es91 2100-0418 4502 0005 1332"),
            "ES9121000418450200051332"
        );
    }

    #[test]
    fn test_validate_iban_valid() {
        assert!(validate_iban("ES9121000418450200051332"));
        assert!(validate_iban("ES91 2100 0418 4502 0005 1332"));
        assert!(validate_iban("PL61109010140000071219812874"));
    }

    #[test]
    fn test_validate_iban_invalid() {
        assert!(!validate_iban("ES1234567890123456789012"));
        assert!(!validate_iban("ES00"));
        assert!(!validate_iban("1234567890123456"));
    }
}
