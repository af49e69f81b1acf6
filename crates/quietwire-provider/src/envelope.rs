//! Wire envelope for software-provider ciphertexts.
//!
//! The opaque ciphertext string handed to callers is this structure,
//! CBOR-encoded and then base64-encoded. Everything the recipient needs
//! to derive the message key and verify the sender travels inside it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// XChaCha20-Poly1305 nonce size in bytes.
pub(crate) const NONCE_SIZE: usize = 24;

/// Envelope encode/decode failures.
#[derive(Debug, Error)]
pub(crate) enum EnvelopeError {
    /// CBOR serialization failed.
    #[error("envelope encode failed: {0}")]
    Encode(String),

    /// The input was not a valid base64-wrapped CBOR envelope.
    #[error("envelope decode failed: {0}")]
    Decode(String),
}

/// One authenticated message.
///
/// The signature covers every other field (see
/// [`Envelope::signed_bytes`]), so a verifier commits to the claimed
/// sender, the addressed recipient, and the exact ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Envelope {
    /// Sender's static x25519 public key.
    pub sender_agreement: [u8; 32],
    /// Recipient's static x25519 public key.
    pub recipient_agreement: [u8; 32],
    /// AEAD nonce, fresh per message.
    pub nonce: [u8; NONCE_SIZE],
    /// XChaCha20-Poly1305 ciphertext (includes the tag).
    pub ciphertext: Vec<u8>,
    /// ed25519 signature over [`Envelope::signed_bytes`].
    pub signature: Vec<u8>,
}

impl Envelope {
    /// The byte string the sender signs and the verifier checks.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 32 + NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.sender_agreement);
        bytes.extend_from_slice(&self.recipient_agreement);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Encode to the opaque ciphertext string.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        let mut cbor = Vec::new();
        ciborium::ser::into_writer(self, &mut cbor)
            .map_err(|e| EnvelopeError::Encode(e.to_string()))?;
        Ok(BASE64.encode(cbor))
    }

    /// Decode from an opaque ciphertext string.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let cbor =
            BASE64.decode(text).map_err(|e| EnvelopeError::Decode(e.to_string()))?;
        ciborium::de::from_reader(cbor.as_slice())
            .map_err(|e| EnvelopeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            sender_agreement: [1; 32],
            recipient_agreement: [2; 32],
            nonce: [3; NONCE_SIZE],
            ciphertext: vec![4, 5, 6],
            signature: vec![7; 64],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let envelope = sample();
        let encoded = envelope.encode().unwrap();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn decode_rejects_non_base64() {
        assert!(matches!(Envelope::decode("not base64!!"), Err(EnvelopeError::Decode(_))));
    }

    #[test]
    fn decode_rejects_truncated_cbor() {
        let encoded = sample().encode().unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(Envelope::decode(truncated).is_err());
    }

    #[test]
    fn signed_bytes_cover_everything_but_the_signature() {
        let envelope = sample();
        let bytes = envelope.signed_bytes();
        assert_eq!(bytes.len(), 32 + 32 + NONCE_SIZE + 3);

        let mut resigned = envelope.clone();
        resigned.signature = vec![9; 64];
        assert_eq!(bytes, resigned.signed_bytes());
    }
}
