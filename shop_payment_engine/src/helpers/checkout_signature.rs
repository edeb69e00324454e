//! # Checkout payload signatures
//!
//! The hosted-payment-page provider authenticates both directions of its integration with an HMAC signature over a
//! canonical base string. The base string is the concatenation, in fixed order and with no delimiters, of
//!
//! ```text
//!    {merchant_id}{order_reference}{amount}{currency}
//! ```
//!
//! where
//!   * `merchant_id` is the merchant account id issued by the provider,
//!   * `order_reference` is the order code (or raw order id) exactly as it appears in the payload,
//!   * `amount` is the amount rendered with exactly two decimal digits ([`Money::format`] — the signature depends
//!     on this exact string form),
//!   * `currency` is the upper-case ISO currency code.
//!
//! The string is signed with HMAC-SHA512 under the merchant's secret API key and hex-encoded (lower case).
//!
//! Missing credentials are a *configuration* problem and are reported as [`SignatureError`], distinct from a
//! verification failure: the caller must answer 500 for the former and a logged-but-rejected 200 for the latter,
//! so the provider's retry logic does not escalate.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use spg_common::{Money, Secret};
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Error)]
#[error("Provider credentials are not configured. {0}")]
pub struct SignatureError(pub String);

pub fn signature_base_string(merchant_id: &str, order_reference: &str, amount: Money, currency: &str) -> String {
    format!("{merchant_id}{order_reference}{}{currency}", amount.format())
}

/// Computes the provider signature for the given payload fields.
pub fn sign_checkout_fields(
    merchant_id: &str,
    order_reference: &str,
    amount: Money,
    currency: &str,
    api_key: &Secret<String>,
) -> Result<String, SignatureError> {
    if merchant_id.is_empty() {
        return Err(SignatureError("Merchant id is empty".into()));
    }
    if api_key.is_empty() {
        return Err(SignatureError("API key is empty".into()));
    }
    let base = signature_base_string(merchant_id, order_reference, amount, currency);
    Ok(hmac_sha512_hex(api_key.reveal().as_bytes(), base.as_bytes()))
}

fn hmac_sha512_hex(key: &[u8], data: &[u8]) -> String {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail.
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time comparison of a provided signature against the recomputed one. An empty provided signature always
/// fails.
pub fn verify_signature(provided: &str, expected: &str) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }
    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod test {
    use super::*;

    fn key() -> Secret<String> {
        Secret::new("test-api-key".to_string())
    }

    #[test]
    fn base_string_has_no_delimiters() {
        let base = signature_base_string("M001", "ORD-2025-0001", Money::from_cents(2500), "USD");
        assert_eq!(base, "M001ORD-2025-000125.00USD");
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let sig = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2500), "USD", &key()).unwrap();
        let expected = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2500), "USD", &key()).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_signature(&sig, &expected));
    }

    #[test]
    fn any_field_mutation_breaks_verification() {
        let expected = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2500), "USD", &key()).unwrap();
        let other_order = sign_checkout_fields("M001", "ORD-2025-0002", Money::from_cents(2500), "USD", &key()).unwrap();
        let other_amount = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2501), "USD", &key()).unwrap();
        assert!(!verify_signature(&other_order, &expected));
        assert!(!verify_signature(&other_amount, &expected));
        // single-character mutation of the signature itself
        let mut mangled = expected.clone();
        let last = mangled.pop().unwrap();
        mangled.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_signature(&mangled, &expected));
    }

    #[test]
    fn empty_signature_always_fails() {
        let expected = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2500), "USD", &key()).unwrap();
        assert!(!verify_signature("", &expected));
    }

    #[test]
    fn missing_credentials_are_a_configuration_error() {
        let err = sign_checkout_fields("", "ORD-2025-0001", Money::from_cents(2500), "USD", &key());
        assert!(err.is_err());
        let err = sign_checkout_fields("M001", "ORD-2025-0001", Money::from_cents(2500), "USD", &Secret::default());
        assert!(err.is_err());
    }
}
