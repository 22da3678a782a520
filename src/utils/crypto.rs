// utils/crypto.rs
//
// Webhook signature primitives: HMAC-SHA256 over the raw payload with a
// per-provider shared secret, compared in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 signature for a payload.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex signature against the raw payload.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrip() {
        let payload = br#"{"event":"payment.completed","amount":50000}"#;
        let signature = sign_payload(payload, "shared-secret");
        assert!(verify_signature(payload, &signature, "shared-secret"));
    }

    #[test]
    fn rejects_tampered_payload() {
        let signature = sign_payload(b"original", "shared-secret");
        assert!(!verify_signature(b"tampered", &signature, "shared-secret"));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage_signature() {
        let signature = sign_payload(b"payload", "secret-a");
        assert!(!verify_signature(b"payload", &signature, "secret-b"));
        assert!(!verify_signature(b"payload", "not-hex!", "secret-a"));
    }
}
