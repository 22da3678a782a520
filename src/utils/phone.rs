// utils/phone.rs
//
// Cameroon phone number parsing and operator detection. Numbers are nine
// digits nationally; the operator is determined by the three-digit prefix.

use crate::models::PaymentProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Mtn,
    Orange,
    Camtel,
    Nexttel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameroonPhone {
    /// Nine-digit national number.
    pub national: String,
    pub operator: Operator,
    /// E.164 form, `+237XXXXXXXXX`.
    pub formatted: String,
}

const MTN_PREFIXES: &[&str] = &[
    "650", "651", "652", "653", "654", "680", "681", "682", "683", "684",
];
const ORANGE_PREFIXES: &[&str] = &[
    "690", "691", "692", "693", "694", "695", "696", "697", "698", "699",
];
const CAMTEL_PREFIXES: &[&str] = &["233", "234", "235", "236", "237", "238", "239"];
const NEXTTEL_PREFIXES: &[&str] = &["666", "667", "668", "669"];

/// Parse a raw phone number into its normalized Cameroon form. Accepts
/// `+237...`, `00237...`, `237...` and bare nine-digit input.
pub fn parse_phone_number(raw: &str) -> Option<CameroonPhone> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = if let Some(rest) = cleaned.strip_prefix("00237") {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("237") {
        rest.to_string()
    } else {
        cleaned
    };

    if national.len() != 9 {
        return None;
    }

    let prefix = &national[..3];
    let operator = if MTN_PREFIXES.contains(&prefix) {
        Operator::Mtn
    } else if ORANGE_PREFIXES.contains(&prefix) {
        Operator::Orange
    } else if CAMTEL_PREFIXES.contains(&prefix) {
        Operator::Camtel
    } else if NEXTTEL_PREFIXES.contains(&prefix) {
        Operator::Nexttel
    } else {
        return None;
    };

    let formatted = format!("+237{national}");
    Some(CameroonPhone {
        national,
        operator,
        formatted,
    })
}

/// Whether a phone number's carrier matches the chosen provider. Cash has
/// no carrier requirement.
pub fn is_compatible_with(raw: &str, provider: PaymentProvider) -> bool {
    let Some(phone) = parse_phone_number(raw) else {
        return false;
    };

    match provider {
        PaymentProvider::MtnMobileMoney => phone.operator == Operator::Mtn,
        PaymentProvider::OrangeMoney => phone.operator == Operator::Orange,
        PaymentProvider::Cash => true,
    }
}

/// Strip the country code for provider APIs that expect national numbers.
pub fn national_number(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = cleaned.strip_prefix("00237") {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("237") {
        rest.to_string()
    } else {
        cleaned
    }
}

/// Mask all but the last four characters for logging. Counts characters,
/// not bytes, so raw caller input cannot split a multibyte boundary.
pub fn mask_phone_number(raw: &str) -> String {
    let count = raw.chars().count();
    if count <= 4 {
        return raw.to_string();
    }
    let visible: String = raw.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mtn_number_with_country_code() {
        let phone = parse_phone_number("+237650000000").unwrap();
        assert_eq!(phone.operator, Operator::Mtn);
        assert_eq!(phone.formatted, "+237650000000");
        assert_eq!(phone.national, "650000000");
    }

    #[test]
    fn parses_orange_number_bare() {
        let phone = parse_phone_number("699999999").unwrap();
        assert_eq!(phone.operator, Operator::Orange);
        assert_eq!(phone.formatted, "+237699999999");
    }

    #[test]
    fn parses_double_zero_prefix() {
        let phone = parse_phone_number("00237651234567").unwrap();
        assert_eq!(phone.operator, Operator::Mtn);
    }

    #[test]
    fn rejects_unknown_prefix_and_bad_length() {
        assert!(parse_phone_number("+237100000000").is_none());
        assert!(parse_phone_number("65000").is_none());
        assert!(parse_phone_number("not a number").is_none());
    }

    #[test]
    fn carrier_compatibility_follows_prefix() {
        assert!(is_compatible_with(
            "+237650000000",
            PaymentProvider::MtnMobileMoney
        ));
        assert!(!is_compatible_with(
            "+237699999999",
            PaymentProvider::MtnMobileMoney
        ));
        assert!(is_compatible_with(
            "+237699999999",
            PaymentProvider::OrangeMoney
        ));
        assert!(is_compatible_with("+237650000000", PaymentProvider::Cash));
    }

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_phone_number("+237650000000"), "*********0000");
        assert_eq!(mask_phone_number("123"), "123");
    }

    #[test]
    fn masks_raw_input_containing_multibyte_characters() {
        // parses because non-digits are stripped, so masking the raw form
        // must not slice inside the multibyte character
        assert!(parse_phone_number("6500000€00").is_some());
        assert_eq!(mask_phone_number("6500000€00"), "******0€00");
    }
}
