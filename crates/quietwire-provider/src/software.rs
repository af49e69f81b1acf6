//! Software provider implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use sha2::Sha256;
use tokio::sync::RwLock;
use x25519_dalek::{PublicKey, StaticSecret};

use quietwire_core::{
    CryptoProvider, Identity, KeyRecord, ProviderError, ProviderSession, Token, TokenSupplier,
};

use crate::envelope::{Envelope, NONCE_SIZE};

/// Domain separation label for message key derivation.
const MESSAGE_KEY_LABEL: &[u8] = b"quietwire message key v1";

/// Published key material layout: agreement key then signing key.
const MATERIAL_SIZE: usize = 64;

/// Public halves published to the directory on registration.
#[derive(Clone)]
struct PublishedKeys {
    agreement: [u8; 32],
    signing: [u8; 32],
}

/// Secret halves kept in the local keystore, reused across re-binds so a
/// re-initialized session can still read messages addressed to it.
#[derive(Clone)]
struct LocalKeys {
    agreement_secret: [u8; 32],
    signing_secret: [u8; 32],
}

struct SharedState {
    directory: RwLock<HashMap<Identity, PublishedKeys>>,
    keystore: RwLock<HashMap<Identity, LocalKeys>>,
}

/// In-memory crypto provider.
///
/// One instance models one directory service: sessions bound through the
/// same instance see each other's published key material, which is what
/// multi-participant tests need. Cloning shares the directory.
#[derive(Clone)]
pub struct SoftwareProvider {
    shared: Arc<SharedState>,
}

impl SoftwareProvider {
    /// Create a provider with an empty directory and keystore.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedState {
                directory: RwLock::new(HashMap::new()),
                keystore: RwLock::new(HashMap::new()),
            }),
        }
    }
}

impl Default for SoftwareProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoftwareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl CryptoProvider for SoftwareProvider {
    type Session = SoftwareSession;

    async fn bind(
        &self,
        identity: Option<Identity>,
        supplier: Arc<dyn TokenSupplier>,
    ) -> Result<Self::Session, ProviderError> {
        let token = supplier.token();
        if token.is_empty() {
            return Err(ProviderError::Token { reason: "empty token".to_string() });
        }
        let identity = match identity {
            Some(identity) => identity,
            None => identity_claim(&token)?,
        };

        let local = {
            let mut keystore = self.shared.keystore.write().await;
            match keystore.get(&identity) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = LocalKeys {
                        agreement_secret: random_array()?,
                        signing_secret: random_array()?,
                    };
                    keystore.insert(identity.clone(), fresh.clone());
                    fresh
                }
            }
        };

        tracing::debug!(identity = %identity, "provider session bound");

        Ok(SoftwareSession {
            identity,
            supplier,
            agreement_secret: StaticSecret::from(local.agreement_secret),
            signing_key: SigningKey::from_bytes(&local.signing_secret),
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Provider session bound to one identity.
pub struct SoftwareSession {
    identity: Identity,
    supplier: Arc<dyn TokenSupplier>,
    agreement_secret: StaticSecret,
    signing_key: SigningKey,
    shared: Arc<SharedState>,
}

impl SoftwareSession {
    /// Re-invoke the token capability; every directory-facing call
    /// re-authenticates so rotated tokens take effect immediately.
    fn current_token(&self) -> Result<Token, ProviderError> {
        let token = self.supplier.token();
        if token.is_empty() {
            return Err(ProviderError::Token { reason: "empty token".to_string() });
        }
        Ok(token)
    }

    fn agreement_public(&self) -> [u8; 32] {
        *PublicKey::from(&self.agreement_secret).as_bytes()
    }
}

#[async_trait]
impl ProviderSession for SoftwareSession {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn register(&self) -> Result<(), ProviderError> {
        self.current_token()?;

        let mut directory = self.shared.directory.write().await;
        if directory.contains_key(&self.identity) {
            return Err(ProviderError::AlreadyRegistered);
        }
        directory.insert(
            self.identity.clone(),
            PublishedKeys {
                agreement: self.agreement_public(),
                signing: self.signing_key.verifying_key().to_bytes(),
            },
        );
        tracing::debug!(identity = %self.identity, "key material published");
        Ok(())
    }

    async fn lookup(
        &self,
        identities: &[Identity],
    ) -> Result<HashMap<Identity, KeyRecord>, ProviderError> {
        self.current_token()?;

        let directory = self.shared.directory.read().await;
        let mut records = HashMap::with_capacity(identities.len());
        for identity in identities {
            let keys = directory
                .get(identity)
                .ok_or_else(|| ProviderError::IdentityNotFound(identity.clone()))?;
            records.insert(
                identity.clone(),
                KeyRecord { identity: identity.clone(), material: encode_material(keys) },
            );
        }
        Ok(records)
    }

    async fn auth_encrypt(
        &self,
        text: &str,
        recipient: &KeyRecord,
    ) -> Result<String, ProviderError> {
        let keys = decode_material(&recipient.material)?;
        let sender_public = self.agreement_public();

        let dh = self.agreement_secret.diffie_hellman(&PublicKey::from(keys.agreement));
        let key = derive_message_key(dh.as_bytes(), &sender_public, &keys.agreement)?;

        let nonce: [u8; NONCE_SIZE] = random_array()?;
        let ciphertext = XChaCha20Poly1305::new(Key::from_slice(&key))
            .encrypt(XNonce::from_slice(&nonce), text.as_bytes())
            .map_err(|_| crypto("encryption failed"))?;

        let mut envelope = Envelope {
            sender_agreement: sender_public,
            recipient_agreement: keys.agreement,
            nonce,
            ciphertext,
            signature: Vec::new(),
        };
        envelope.signature = self.signing_key.sign(&envelope.signed_bytes()).to_bytes().to_vec();

        envelope.encode().map_err(|e| crypto(&e.to_string()))
    }

    async fn auth_decrypt(
        &self,
        text: &str,
        sender: Option<&KeyRecord>,
    ) -> Result<String, ProviderError> {
        let envelope = Envelope::decode(text).map_err(|e| crypto(&e.to_string()))?;
        let own_public = self.agreement_public();

        // Pick the verifying key and DH partner, cross-checking the
        // envelope's claims before any key derivation.
        let (verifying, dh_partner) = match sender {
            Some(record) => {
                let keys = decode_material(&record.material)?;
                if envelope.sender_agreement != keys.agreement {
                    return Err(crypto("sender key does not match the envelope"));
                }
                if envelope.recipient_agreement != own_public {
                    return Err(crypto("message not addressed to this identity"));
                }
                let verifying = VerifyingKey::from_bytes(&keys.signing)
                    .map_err(|_| crypto("invalid published signing key"))?;
                (verifying, envelope.sender_agreement)
            }
            None => {
                if envelope.sender_agreement != own_public {
                    return Err(crypto("message not authored by this identity"));
                }
                (self.signing_key.verifying_key(), envelope.recipient_agreement)
            }
        };

        let signature = Signature::from_slice(&envelope.signature)
            .map_err(|_| crypto("malformed signature"))?;
        verifying
            .verify(&envelope.signed_bytes(), &signature)
            .map_err(|_| crypto("signature verification failed"))?;

        let dh = self.agreement_secret.diffie_hellman(&PublicKey::from(dh_partner));
        let key = derive_message_key(
            dh.as_bytes(),
            &envelope.sender_agreement,
            &envelope.recipient_agreement,
        )?;

        let plaintext = XChaCha20Poly1305::new(Key::from_slice(&key))
            .decrypt(XNonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| crypto("authentication tag mismatch"))?;

        String::from_utf8(plaintext).map_err(|_| crypto("plaintext is not valid UTF-8"))
    }
}

impl std::fmt::Debug for SoftwareSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareSession").field("identity", &self.identity).finish_non_exhaustive()
    }
}

/// Extract the identity claim from a `<secret>@<identity>` token.
fn identity_claim(token: &Token) -> Result<Identity, ProviderError> {
    match token.as_str().rsplit_once('@') {
        Some((_, claim)) if !claim.is_empty() => Ok(Identity::new(claim)),
        _ => Err(ProviderError::Token { reason: "token carries no identity claim".to_string() }),
    }
}

/// HKDF-SHA256 over the DH shared secret, bound to both public keys so a
/// key derived for one (sender, recipient) pair never decrypts another's
/// traffic.
fn derive_message_key(
    dh: &[u8],
    sender: &[u8; 32],
    recipient: &[u8; 32],
) -> Result<[u8; 32], ProviderError> {
    let mut info = Vec::with_capacity(MESSAGE_KEY_LABEL.len() + 64);
    info.extend_from_slice(MESSAGE_KEY_LABEL);
    info.extend_from_slice(sender);
    info.extend_from_slice(recipient);

    let mut key = [0u8; 32];
    Hkdf::<Sha256>::new(None, dh)
        .expand(&info, &mut key)
        .map_err(|_| crypto("key derivation failed"))?;
    Ok(key)
}

fn encode_material(keys: &PublishedKeys) -> Vec<u8> {
    let mut material = Vec::with_capacity(MATERIAL_SIZE);
    material.extend_from_slice(&keys.agreement);
    material.extend_from_slice(&keys.signing);
    material
}

fn decode_material(material: &[u8]) -> Result<PublishedKeys, ProviderError> {
    if material.len() != MATERIAL_SIZE {
        return Err(crypto("malformed published key material"));
    }
    let mut agreement = [0u8; 32];
    let mut signing = [0u8; 32];
    agreement.copy_from_slice(&material[..32]);
    signing.copy_from_slice(&material[32..]);
    Ok(PublishedKeys { agreement, signing })
}

fn random_array<const N: usize>() -> Result<[u8; N], ProviderError> {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes)
        .map_err(|e| ProviderError::Unavailable { reason: format!("entropy source failed: {e}") })?;
    Ok(bytes)
}

fn crypto(reason: &str) -> ProviderError {
    ProviderError::Crypto { reason: reason.to_string() }
}
