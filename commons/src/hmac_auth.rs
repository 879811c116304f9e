//! Peer-sync HMAC signer/verifier (§4.1).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Unix timestamp (seconds) the request was signed at.
pub const HEADER_TIMESTAMP: &str = "X-Sync-Timestamp";
/// Header carrying the lowercase-hex HMAC-SHA256 signature.
pub const HEADER_SIGNATURE: &str = "X-Sync-Signature";

/// Maximum allowed clock skew between signer and verifier.
pub const MAX_SKEW_SECONDS: i64 = 5 * 60;

/// Build the canonical string: `METHOD "\n" PATH "\n" TIMESTAMP "\n" SHA256(body, hex)`.
fn canonical_string(method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let body_digest = hex::encode(hasher.finalize());
    format!("{}\n{}\n{}\n{}", method, path, timestamp, body_digest)
}

/// Sign a request, returning the lowercase-hex HMAC-SHA256 over the
/// canonical string.
pub fn sign(secret: &[u8], method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    let message = canonical_string(method, path, timestamp, body);
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Reasons a verification can fail, kept internal: callers only ever see
/// the generic `Unauthorized` error (§7: "never leak which part failed").
#[derive(Debug, PartialEq, Eq)]
pub enum VerifyFailure {
    MissingTimestamp,
    MissingSignature,
    InvalidTimestamp,
    StaleTimestamp,
    BadSignatureEncoding,
    SignatureMismatch,
}

/// Verify a peer request against the shared secret.
///
/// `now` is the verifier's current Unix timestamp, passed in so tests can
/// control clock skew deterministically.
pub fn verify(
    secret: &[u8],
    method: &str,
    path: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), VerifyFailure> {
    let timestamp = timestamp.ok_or(VerifyFailure::MissingTimestamp)?;
    let signature = signature.ok_or(VerifyFailure::MissingSignature)?;

    let ts: i64 = timestamp.parse().map_err(|_| VerifyFailure::InvalidTimestamp)?;
    if (now - ts).abs() > MAX_SKEW_SECONDS {
        return Err(VerifyFailure::StaleTimestamp);
    }

    let expected_mac_bytes = {
        let message = canonical_string(method, path, timestamp, body);
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
        mac.update(message.as_bytes());
        mac
    };

    let provided = hex::decode(signature).map_err(|_| VerifyFailure::BadSignatureEncoding)?;
    expected_mac_bytes
        .verify_slice(&provided)
        .map_err(|_| VerifyFailure::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"shared-secret";

    #[test]
    fn accepts_a_valid_signature_within_skew() {
        let now = 1_700_000_000;
        let ts = now.to_string();
        let sig = sign(SECRET, "GET", "/sync", &ts, b"");
        assert!(verify(SECRET, "GET", "/sync", Some(&ts), Some(&sig), b"", now).is_ok());
    }

    #[test]
    fn rejects_single_byte_mutation_of_signature() {
        let now = 1_700_000_000;
        let ts = now.to_string();
        let mut sig = sign(SECRET, "GET", "/sync", &ts, b"");
        let last = sig.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        sig.push(flipped);
        assert_eq!(
            verify(SECRET, "GET", "/sync", Some(&ts), Some(&sig), b"", now),
            Err(VerifyFailure::SignatureMismatch)
        );
    }

    #[test]
    fn rejects_timestamp_beyond_skew() {
        let signed_at = 1_700_000_000;
        let ts = signed_at.to_string();
        let sig = sign(SECRET, "GET", "/sync", &ts, b"");
        let now = signed_at + 10 * 60;
        assert_eq!(
            verify(SECRET, "GET", "/sync", Some(&ts), Some(&sig), b"", now),
            Err(VerifyFailure::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_missing_headers() {
        assert_eq!(
            verify(SECRET, "GET", "/sync", None, Some("ab"), b"", 0),
            Err(VerifyFailure::MissingTimestamp)
        );
        assert_eq!(
            verify(SECRET, "GET", "/sync", Some("0"), None, b"", 0),
            Err(VerifyFailure::MissingSignature)
        );
    }
}
