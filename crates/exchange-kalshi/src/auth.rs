//! RSA-PSS authentication for the Kalshi trade API.
//!
//! Kalshi signs requests with RSA-PSS (SHA-256) over
//! `timestamp_ms + METHOD + path` and sends the result in the
//! `KALSHI-ACCESS-*` headers.
//!
//! # Security
//!
//! - Key material arrives as [`SecretString`] and is never logged.
//! - The API key id is zeroized on drop.

use crate::error::{KalshiError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

/// Headers required for authenticated Kalshi API requests.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// `KALSHI-ACCESS-KEY` header.
    pub access_key: String,
    /// `KALSHI-ACCESS-SIGNATURE` header (base64 encoded).
    pub signature: String,
    /// `KALSHI-ACCESS-TIMESTAMP` header (Unix milliseconds).
    pub timestamp: String,
}

impl SignedHeaders {
    /// Returns headers as tuples for reqwest.
    #[must_use]
    pub fn as_tuples(&self) -> [(&'static str, &str); 3] {
        [
            ("KALSHI-ACCESS-KEY", &self.access_key),
            ("KALSHI-ACCESS-SIGNATURE", &self.signature),
            ("KALSHI-ACCESS-TIMESTAMP", &self.timestamp),
        ]
    }
}

/// RSA-PSS request signer.
pub struct KalshiAuth {
    api_key: String,
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for KalshiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiAuth")
            .field("api_key", &"[REDACTED]")
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for KalshiAuth {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl KalshiAuth {
    /// Creates a signer from an API key id and a PEM-encoded private key.
    ///
    /// Escaped `\n` sequences in the PEM (common when the key travels through
    /// an environment variable) are expanded.
    ///
    /// # Errors
    /// Returns [`KalshiError::Signing`] if the key cannot be parsed.
    pub fn new(api_key: &SecretString, private_key_pem: &SecretString) -> Result<Self> {
        let pem = private_key_pem.expose_secret().replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| KalshiError::Signing(format!("failed to parse private key: {e}")))?;

        Ok(Self {
            api_key: api_key.expose_secret().to_string(),
            private_key,
        })
    }

    /// Signs a request, stamping it with the current time.
    ///
    /// # Errors
    /// Returns an error if the system clock is unavailable or signing fails.
    pub fn sign_request(&self, method: &str, path: &str) -> Result<SignedHeaders> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| KalshiError::Signing(format!("failed to get timestamp: {e}")))?
            .as_millis() as u64;

        self.sign_request_with_timestamp(method, path, timestamp_ms)
    }

    /// Signs a request with a specific timestamp (useful for testing).
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn sign_request_with_timestamp(
        &self,
        method: &str,
        path: &str,
        timestamp_ms: u64,
    ) -> Result<SignedHeaders> {
        let timestamp = timestamp_ms.to_string();
        let message = format!("{timestamp}{method}{path}");

        let signing_key = BlindedSigningKey::<Sha256>::new(self.private_key.clone());
        let mut rng = rand::thread_rng();
        let signature = signing_key.sign_with_rng(&mut rng, message.as_bytes());

        Ok(SignedHeaders {
            access_key: self.api_key.clone(),
            signature: BASE64.encode(signature.to_bytes()),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_headers_as_tuples() {
        let headers = SignedHeaders {
            access_key: "key-id".to_string(),
            signature: "c2ln".to_string(),
            timestamp: "1706817600000".to_string(),
        };

        let tuples = headers.as_tuples();
        assert_eq!(tuples[0], ("KALSHI-ACCESS-KEY", "key-id"));
        assert_eq!(tuples[1], ("KALSHI-ACCESS-SIGNATURE", "c2ln"));
        assert_eq!(tuples[2], ("KALSHI-ACCESS-TIMESTAMP", "1706817600000"));
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let result = KalshiAuth::new(
            &SecretString::from("key-id"),
            &SecretString::from("not a pem"),
        );

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("parse private key"));
    }

    #[test]
    fn test_message_format() {
        // Signed message is timestamp + METHOD + path, no separators.
        let message = format!("{}{}{}", "1706817600000", "POST", "/portfolio/orders");
        assert_eq!(message, "1706817600000POST/portfolio/orders");
    }

    #[test]
    fn test_sign_round_trip_with_generated_key() {
        use rsa::pkcs8::EncodePrivateKey;

        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();

        let auth = KalshiAuth::new(
            &SecretString::from("key-id"),
            &SecretString::from(pem.to_string()),
        )
        .unwrap();

        let headers = auth
            .sign_request_with_timestamp("GET", "/portfolio/balance", 1_706_817_600_000)
            .unwrap();

        assert_eq!(headers.access_key, "key-id");
        assert_eq!(headers.timestamp, "1706817600000");
        // PSS signatures are randomized but always base64-decodable.
        assert!(BASE64.decode(&headers.signature).is_ok());
    }

    #[test]
    fn test_debug_never_exposes_key() {
        use rsa::pkcs8::EncodePrivateKey;

        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();

        let auth = KalshiAuth::new(
            &SecretString::from("my-secret-key-id"),
            &SecretString::from(pem.to_string()),
        )
        .unwrap();

        let debug = format!("{:?}", auth);
        assert!(!debug.contains("my-secret-key-id"));
        assert!(debug.contains("REDACTED"));
    }
}
