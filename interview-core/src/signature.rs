//! HMAC-SHA256 signatures over callback bodies.
//!
//! Header format is `sha256=<lowercase hex>`, computed over the raw body
//! bytes with a shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Produce the header value for `body`.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify a header value using constant-time comparison.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(signature_hex) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}
