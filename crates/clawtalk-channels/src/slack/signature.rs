//! Slack request signature verification (§4.4).
//!
//! Grounded in the teacher's `SlackAdapter::verify_signature`, generalized
//! to try an ordered set of candidate secrets (one per configured account,
//! then the base/env fallback) rather than a single fixed secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

const MAX_TIMESTAMP_AGE_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn signature_for(secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(format!("invalid signing secret: {e}")))?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verify `body` against `signature` using the first matching secret in
/// `candidates` (ordered `(account_id, secret)` pairs, most specific
/// first). Returns the owning account id on success.
pub fn verify(
    candidates: &[(String, String)],
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<String> {
    let ts: u64 = timestamp
        .parse()
        .map_err(|_| Error::Signature("invalid timestamp".to_string()))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::Signature("system clock error".to_string()))?
        .as_secs();
    if now.abs_diff(ts) > MAX_TIMESTAMP_AGE_SECS {
        return Err(Error::Signature("timestamp outside allowed window".to_string()));
    }

    for (account_id, secret) in candidates {
        let expected = signature_for(secret, timestamp, body)?;
        if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Ok(account_id.clone());
        }
    }

    Err(Error::Signature("no matching signing secret".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, ts: &str, body: &str) -> String {
        signature_for(secret, ts, body.as_bytes()).unwrap()
    }

    fn now_ts() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    #[test]
    fn b2_first_match_wins_and_sets_account_id() {
        let ts = now_ts();
        let body = "hello";
        let sig = sign("acct-secret", &ts, body);
        let candidates = vec![
            ("acme".to_string(), "acct-secret".to_string()),
            ("default".to_string(), "base-secret".to_string()),
        ];
        let account = verify(&candidates, &ts, body.as_bytes(), &sig).unwrap();
        assert_eq!(account, "acme");
    }

    #[test]
    fn b2_rejects_old_timestamp() {
        let body = "hello";
        let sig = sign("secret", "1000000000", body);
        let candidates = vec![("default".to_string(), "secret".to_string())];
        let err = verify(&candidates, "1000000000", body.as_bytes(), &sig).unwrap_err();
        assert!(matches!(err, Error::Signature(_)));
    }

    #[test]
    fn no_candidate_matches() {
        let ts = now_ts();
        let candidates = vec![("default".to_string(), "secret".to_string())];
        let err = verify(&candidates, &ts, b"body", "v0=deadbeef").unwrap_err();
        assert!(matches!(err, Error::Signature(_)));
    }
}
