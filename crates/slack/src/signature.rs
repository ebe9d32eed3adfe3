use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {age_secs}s away from now")]
    Stale { age_secs: i64 },
    #[error("signature is not a `v0=` hex digest")]
    Malformed,
    #[error("signature does not match request body")]
    Mismatch,
}

/// Verifies Slack's request signing scheme: `v0=` + hex HMAC-SHA256 of
/// `v0:<timestamp>:<raw body>` keyed by the app's signing secret.
pub struct SignatureVerifier {
    secret: SecretString,
    max_age_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret, max_age_secs: MAX_REQUEST_AGE_SECS }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;
        // The header is unauthenticated, so any i64 can arrive here.
        if now.abs_diff(sent_at) > self.max_age_secs.unsigned_abs() {
            return Err(SignatureError::Stale { age_secs: now.saturating_sub(sent_at) });
        }

        let digest = signature
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::Malformed)?;

        self.mac(timestamp, body)?.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }

    /// Produces the header value Slack would send for `body` at `timestamp`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const NOW: i64 = 1_700_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("8f742231b10e8888abcd99yyyzzz85a5"))
    }

    #[test]
    fn accepts_body_signed_with_same_secret() {
        let verifier = verifier();
        let body = b"token=x&command=%2Fskelly&text=list";
        let signature = verifier.sign("1700000000", body).expect("sign");

        assert!(signature.starts_with("v0="));
        assert_eq!(verifier.verify_at(Some("1700000000"), Some(&signature), body, NOW), Ok(()));
    }

    #[test]
    fn matches_slack_documented_example() {
        let verifier = verifier();
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let signature = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";

        assert_eq!(verifier.verify_at(Some("1531420618"), Some(signature), body, 1_531_420_618), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = verifier();
        let signature = verifier.sign("1700000000", b"text=list").expect("sign");

        assert_eq!(
            verifier.verify_at(Some("1700000000"), Some(&signature), b"text=clear", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_requests_outside_replay_window() {
        let verifier = verifier();
        let signature = verifier.sign("1699999000", b"{}").expect("sign");

        assert_eq!(
            verifier.verify_at(Some("1699999000"), Some(&signature), b"{}", NOW),
            Err(SignatureError::Stale { age_secs: 1000 })
        );
    }

    #[test]
    fn extreme_timestamps_are_stale_not_overflows() {
        let verifier = verifier();
        for (timestamp, now) in [
            (i64::MIN.to_string(), NOW),
            (i64::MAX.to_string(), NOW),
            (i64::MIN.to_string(), i64::MAX),
            (i64::MAX.to_string(), i64::MIN),
        ] {
            assert!(matches!(
                verifier.verify_at(Some(&timestamp), Some("v0=00"), b"body", now),
                Err(SignatureError::Stale { .. })
            ));
        }
        assert!(matches!(
            verifier.verify(Some("-9223372036854775808"), Some("v0=00"), b"body"),
            Err(SignatureError::Stale { .. })
        ));
    }

    #[test]
    fn reports_missing_and_malformed_headers() {
        let verifier = verifier();
        assert_eq!(
            verifier.verify_at(None, Some("v0=00"), b"{}", NOW),
            Err(SignatureError::MissingHeader(TIMESTAMP_HEADER))
        );
        assert_eq!(
            verifier.verify_at(Some("1700000000"), Some(" "), b"{}", NOW),
            Err(SignatureError::MissingHeader(SIGNATURE_HEADER))
        );
        assert_eq!(
            verifier.verify_at(Some("1700000000"), Some("v1=zz"), b"{}", NOW),
            Err(SignatureError::Malformed)
        );
        assert!(matches!(
            verifier.verify_at(Some("yesterday"), Some("v0=00"), b"{}", NOW),
            Err(SignatureError::InvalidTimestamp(_))
        ));
    }
}
