// utils/reference.rs
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::models::PaymentProvider;

fn base36(mut value: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Human-traceable transaction reference embedding the provider prefix,
/// e.g. `OKD-MTN-ORDER42-LX3K9A-8F2QZ1`.
pub fn generate_transaction_reference(provider: PaymentProvider, order_id: &str) -> String {
    let timestamp = base36(chrono::Utc::now().timestamp_millis() as u128);
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    format!(
        "OKD-{}-{}-{}-{}",
        provider.reference_prefix(),
        order_id,
        timestamp,
        random
    )
    .to_uppercase()
}

/// Eight-digit numeric pickup code for cash payments.
pub fn generate_payment_code() -> String {
    rand::thread_rng().gen_range(10_000_000u32..=99_999_999).to_string()
}

/// Opaque USSD session identifier.
pub fn generate_session_id() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("USSD-{}-{}", chrono::Utc::now().timestamp_millis(), random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_embeds_provider_prefix() {
        let mtn = generate_transaction_reference(PaymentProvider::MtnMobileMoney, "order-1");
        let orange = generate_transaction_reference(PaymentProvider::OrangeMoney, "order-1");
        let cash = generate_transaction_reference(PaymentProvider::Cash, "order-1");

        assert!(mtn.starts_with("OKD-MTN-ORDER-1-"));
        assert!(orange.starts_with("OKD-ORG-ORDER-1-"));
        assert!(cash.starts_with("OKD-CSH-ORDER-1-"));
    }

    #[test]
    fn references_are_distinct_per_call() {
        let a = generate_transaction_reference(PaymentProvider::MtnMobileMoney, "order-9");
        let b = generate_transaction_reference(PaymentProvider::MtnMobileMoney, "order-9");
        assert_ne!(a, b);
    }

    #[test]
    fn payment_code_is_eight_digits() {
        for _ in 0..32 {
            let code = generate_payment_code();
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
