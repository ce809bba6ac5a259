//! Encrypted credential persistence
//!
//! Long-lived secrets (personal access tokens, OAuth2 refresh tokens, App and
//! SSH private keys) are encrypted with AES-256-GCM and handed to a
//! [`CredentialStore`] under a `{namespace, host}` key. Short-lived access
//! tokens are never persisted.
//!
//! The default store is the system keyring (macOS Keychain, Linux Secret
//! Service). The master key comes from `FORGE_AUTH_VAULT_KEY` (base64) or is
//! generated once and kept in the keyring.
//!
//! Priority for the master key: env var > keyring > freshly generated

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use keyring::Entry;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{ForgeError, Result};

const SERVICE_NAME: &str = "forge-auth";
const MASTER_KEY_NAME: &str = "vault-master-key";
const VAULT_KEY_ENV: &str = "FORGE_AUTH_VAULT_KEY";
const NONCE_LEN: usize = 12;
const STORED_VERSION: u8 = 1;

/// Composite key for a stored credential
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub namespace: String,
    /// Lowercased host, without port
    pub host: String,
}

impl CredentialKey {
    pub fn new(namespace: impl Into<String>, host: &str) -> Self {
        Self {
            namespace: namespace.into(),
            host: host.trim().trim_end_matches('.').to_ascii_lowercase(),
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.host)
    }
}

/// Opaque blob storage
///
/// Implementations never see plaintext; encryption happens in
/// [`CredentialVault`].
pub trait CredentialStore: Send + Sync {
    fn put(&self, key: &CredentialKey, blob: &[u8]) -> Result<()>;
    fn get(&self, key: &CredentialKey) -> Result<Option<Vec<u8>>>;
    /// Deleting a missing entry is not an error
    fn delete(&self, key: &CredentialKey) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyring store
// ─────────────────────────────────────────────────────────────────────────────

/// Store backed by the system keyring
#[derive(Debug, Clone, Default)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    fn entry(key: &CredentialKey) -> Result<Entry> {
        Ok(Entry::new(SERVICE_NAME, &key.to_string())?)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn put(&self, key: &CredentialKey, blob: &[u8]) -> Result<()> {
        Self::entry(key)?.set_password(&STANDARD.encode(blob))?;
        Ok(())
    }

    fn get(&self, key: &CredentialKey) -> Result<Option<Vec<u8>>> {
        match Self::entry(key)?.get_password() {
            Ok(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(|e| ForgeError::CorruptedCredential(format!("keyring payload is not base64 ({})", e))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ForgeError::CredentialStore(format!(
                "Cannot access system keychain. Make sure your keyring is unlocked. ({})",
                e
            ))),
        }
    }

    fn delete(&self, key: &CredentialKey) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(ForgeError::CredentialStore(e.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local store, for tests and headless runs
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<CredentialKey, Vec<u8>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CredentialKey, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| ForgeError::CredentialStore("in-memory store poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn put(&self, key: &CredentialKey, blob: &[u8]) -> Result<()> {
        self.lock()?.insert(key.clone(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &CredentialKey) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &CredentialKey) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encryption
// ─────────────────────────────────────────────────────────────────────────────

/// AES-256-GCM cipher; blobs are `nonce || ciphertext`
pub struct SecretCipher {
    key: Zeroizing<[u8; 32]>,
}

impl SecretCipher {
    pub fn new(key: Zeroizing<[u8; 32]>) -> Self {
        Self { key }
    }

    /// Cipher with a fresh random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut key[..]);
        Self { key }
    }

    /// Decode a base64 master key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| ForgeError::Config(format!("Invalid vault key encoding: {}", e)))?,
        );
        if bytes.len() != 32 {
            return Err(ForgeError::Config(format!(
                "Vault key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Resolve the master key from the environment or the keyring
    ///
    /// A key is generated and stored in the keyring on first use.
    pub fn from_env_or_keyring() -> Result<Self> {
        if let Some(cipher) = Self::existing()? {
            return Ok(cipher);
        }

        let cipher = Self::generate();
        let encoded = Zeroizing::new(STANDARD.encode(&cipher.key[..]));
        Entry::new(SERVICE_NAME, MASTER_KEY_NAME)?.set_password(&encoded)?;
        debug!("Generated a new vault master key");
        Ok(cipher)
    }

    /// The master key from the environment or the keyring, never creating one
    pub fn existing() -> Result<Option<Self>> {
        if let Ok(encoded) = std::env::var(VAULT_KEY_ENV) {
            if !encoded.is_empty() {
                return Self::from_base64(&encoded).map(Some);
            }
        }

        match Entry::new(SERVICE_NAME, MASTER_KEY_NAME)?.get_password() {
            Ok(encoded) => Self::from_base64(&encoded).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ForgeError::CredentialStore(e.to_string())),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|e| ForgeError::CredentialStore(format!("Cipher init failed: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| ForgeError::CredentialStore(format!("Encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if blob.len() <= NONCE_LEN {
            return Err(ForgeError::CredentialStore("Encrypted blob is truncated".into()));
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|e| ForgeError::CredentialStore(format!("Cipher init failed: {}", e)))?;
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| ForgeError::CredentialStore("Decryption failed".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vault
// ─────────────────────────────────────────────────────────────────────────────

/// Long-lived secret material kept between runs
#[derive(Debug, Clone)]
pub struct StoredCredential {
    /// Auth method tag the secret belongs to
    pub method: String,
    pub secret: SecretString,
    pub passphrase: Option<SecretString>,
}

impl StoredCredential {
    pub fn new(method: &str, secret: SecretString) -> Self {
        Self {
            method: method.to_string(),
            secret,
            passphrase: None,
        }
    }
}

/// Serializable form; SecretString doesn't implement Serialize
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    version: u8,
    method: String,
    secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passphrase: Option<String>,
}

/// Encrypting front for a [`CredentialStore`]
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<SecretCipher>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn CredentialStore>, cipher: SecretCipher) -> Self {
        Self {
            store,
            cipher: Arc::new(cipher),
        }
    }

    /// Encrypt and persist a credential
    pub fn save(&self, key: &CredentialKey, credential: &StoredCredential) -> Result<()> {
        let record = StoredRecord {
            version: STORED_VERSION,
            method: credential.method.clone(),
            secret: credential.secret.expose_secret().to_string(),
            passphrase: credential
                .passphrase
                .as_ref()
                .map(|p| p.expose_secret().to_string()),
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&record)?);
        let blob = self.cipher.encrypt(&plaintext)?;
        self.store.put(key, &blob)
    }

    /// Load and decrypt a credential
    ///
    /// Store faults read as "nothing stored". Entries the store reports as
    /// corrupted, or that fail to decrypt or parse, are deleted so the caller
    /// re-authenticates.
    pub fn load(&self, key: &CredentialKey) -> Option<StoredCredential> {
        let blob = match self.store.get(key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(ForgeError::CorruptedCredential(reason)) => {
                warn!(key = %key, reason = %reason, "Discarding corrupted stored credential");
                self.discard(key);
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Credential store unavailable; treating as empty");
                return None;
            }
        };

        let decoded = self
            .cipher
            .decrypt(&blob)
            .and_then(|plain| Ok(serde_json::from_slice::<StoredRecord>(&plain)?));

        match decoded {
            Ok(record) if record.version == STORED_VERSION => Some(StoredCredential {
                method: record.method,
                secret: SecretString::from(record.secret),
                passphrase: record.passphrase.map(SecretString::from),
            }),
            Ok(record) => {
                warn!(key = %key, version = record.version, "Discarding stored credential with unknown version");
                self.discard(key);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecryptable stored credential");
                self.discard(key);
                None
            }
        }
    }

    /// Remove a stored credential
    pub fn delete(&self, key: &CredentialKey) -> Result<()> {
        self.store.delete(key)
    }

    fn discard(&self, key: &CredentialKey) {
        if let Err(e) = self.store.delete(key) {
            warn!(key = %key, error = %e, "Failed to delete corrupted credential");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(store: Arc<MemoryCredentialStore>) -> CredentialVault {
        CredentialVault::new(store, SecretCipher::generate())
    }

    #[test]
    fn test_key_is_normalized() {
        let key = CredentialKey::new("forge-auth", " GitHub.COM. ");
        assert_eq!(key.host, "github.com");
        assert_eq!(key.to_string(), "forge-auth/github.com");
    }

    #[test]
    fn test_save_and_load() {
        let store = Arc::new(MemoryCredentialStore::new());
        let vault = vault(store.clone());
        let key = CredentialKey::new("forge-auth", "github.com");

        vault
            .save(&key, &StoredCredential::new("pat", SecretString::from("ghp_secret")))
            .unwrap();

        // The store only ever sees ciphertext
        let blob = store.get(&key).unwrap().unwrap();
        assert!(!blob.windows(10).any(|w| w == b"ghp_secret"));

        let loaded = vault.load(&key).unwrap();
        assert_eq!(loaded.method, "pat");
        assert_eq!(loaded.secret.expose_secret(), "ghp_secret");
    }

    #[test]
    fn test_corrupted_entry_is_deleted() {
        let store = Arc::new(MemoryCredentialStore::new());
        let key = CredentialKey::new("forge-auth", "gitlab.com");
        store.put(&key, b"definitely not ciphertext").unwrap();

        let vault = vault(store.clone());
        assert!(vault.load(&key).is_none());
        assert!(store.is_empty());
    }

    /// Reports its entry as undecodable until it is deleted
    #[derive(Default)]
    struct UndecodableStore {
        deleted: std::sync::atomic::AtomicUsize,
    }

    impl CredentialStore for UndecodableStore {
        fn put(&self, _key: &CredentialKey, _blob: &[u8]) -> Result<()> {
            Ok(())
        }

        fn get(&self, _key: &CredentialKey) -> Result<Option<Vec<u8>>> {
            if self.deleted.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                return Ok(None);
            }
            Err(ForgeError::CorruptedCredential("keyring payload is not base64".into()))
        }

        fn delete(&self, _key: &CredentialKey) -> Result<()> {
            self.deleted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_undecodable_store_entry_is_deleted() {
        let store = Arc::new(UndecodableStore::default());
        let vault = CredentialVault::new(store.clone(), SecretCipher::generate());
        let key = CredentialKey::new("forge-auth", "github.com");

        assert!(vault.load(&key).is_none());
        assert_eq!(store.deleted.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Nothing left to discard on the next read
        assert!(vault.load(&key).is_none());
        assert_eq!(store.deleted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_key_is_treated_as_missing() {
        let store = Arc::new(MemoryCredentialStore::new());
        let key = CredentialKey::new("forge-auth", "gitea.com");
        vault(store.clone())
            .save(&key, &StoredCredential::new("pat", SecretString::from("abc")))
            .unwrap();

        // A different master key cannot decrypt the entry
        assert!(vault(store.clone()).load(&key).is_none());
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_cipher_from_base64_rejects_short_keys() {
        assert!(SecretCipher::from_base64(&STANDARD.encode([1u8; 16])).is_err());
        assert!(SecretCipher::from_base64(&STANDARD.encode([1u8; 32])).is_ok());
    }
}
