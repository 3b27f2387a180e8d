// src/utils/signing.rs

//! Request signatures for the affiliate and partner APIs.
//!
//! Both are pure functions of their inputs; callers must sign the exact
//! timestamp and body bytes they send.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// `hex(sha256(app_id || timestamp || payload || secret))`
pub fn affiliate_signature(app_id: &str, timestamp: i64, payload: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// `hex(hmac_sha256(partner_key, partner_id || path || timestamp || shop_id || body))`
pub fn partner_signature(
    partner_key: &str,
    partner_id: &str,
    path: &str,
    timestamp: i64,
    shop_id: &str,
    body: &str,
) -> String {
    let mut mac = HmacSha256::new_from_slice(partner_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(partner_id.as_bytes());
    mac.update(path.as_bytes());
    mac.update(timestamp.to_string().as_bytes());
    mac.update(shop_id.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
