//! Key Registry: the process-wide set of Ed25519 signing keys, indexed by
//! key id (`kid`).
//!
//! Keys are provisioned once at startup, either from a directory of PKCS#8
//! PEM files (`<kid>.pem`) or programmatically through
//! [`KeyRegistryBuilder`]. The registry is immutable afterwards, so reads
//! need no locking.
//!
//! Every registered key can verify tokens. One of them may be marked active
//! and is used when a caller does not pick a kid. Rotating keys means adding
//! a new file, switching `AUTH_ACTIVE_KID`, and removing the old file once
//! the tokens it signed have expired.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use tracing::{debug, info};

use crate::error::AuthError;

/// PKCS#8 v1 prefix for a bare Ed25519 private key, followed by the 32 secret bytes.
const PKCS8_ED25519_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
];

struct RegisteredKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl RegisteredKey {
    fn from_signing_key(kid: &str, key: &SigningKey) -> Result<Self, AuthError> {
        let mut der = Vec::with_capacity(PKCS8_ED25519_PREFIX.len() + 32);
        der.extend_from_slice(&PKCS8_ED25519_PREFIX);
        der.extend_from_slice(&key.to_bytes());
        let encoding = EncodingKey::from_ed_der(&der);

        let public = URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes());
        let decoding =
            DecodingKey::from_ed_components(&public).map_err(|e| AuthError::key_material(kid, e))?;

        Ok(Self { encoding, decoding })
    }
}

pub struct KeyRegistry {
    keys: HashMap<String, RegisteredKey>,
    active: Option<String>,
}

impl KeyRegistry {
    pub fn builder() -> KeyRegistryBuilder {
        KeyRegistryBuilder::default()
    }

    /// Loads every `*.pem` file in `dir` as a key whose kid is the file stem.
    ///
    /// When `active` is `None` and exactly one key is found, that key becomes
    /// active.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Io`] if the directory or a file cannot be read
    /// - [`AuthError::KeyMaterial`] if a file is not an Ed25519 PKCS#8 PEM, or
    ///   the directory holds no keys
    /// - [`AuthError::UnknownKey`] if `active` names a kid that was not found
    pub fn load_dir(dir: &Path, active: Option<&str>) -> Result<Self, AuthError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "pem"))
            .collect();
        paths.sort();

        let mut builder = Self::builder();
        for path in paths {
            let kid = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| AuthError::key_material(&path.display().to_string(), "file name is not valid UTF-8"))?
                .to_string();
            let pem = fs::read_to_string(&path)?;
            builder.insert_pem(&kid, &pem)?;
            info!(kid = %kid, path = %path.display(), "Loaded signing key");
        }

        if builder.is_empty() {
            return Err(AuthError::key_material(
                &dir.display().to_string(),
                "directory contains no *.pem keys",
            ));
        }

        if let Some(kid) = active {
            builder.active(kid);
        }
        builder.build()
    }

    /// Verification key for `kid`.
    ///
    /// `kid` usually comes straight from an untrusted token header; an unknown
    /// value is an ordinary error.
    pub fn resolve(&self, kid: &str) -> Result<&DecodingKey, AuthError> {
        self.keys
            .get(kid)
            .map(|key| &key.decoding)
            .ok_or_else(|| AuthError::UnknownKey {
                kid: kid.to_string(),
            })
    }

    pub(crate) fn signing_key(&self, kid: &str) -> Result<&EncodingKey, AuthError> {
        self.keys
            .get(kid)
            .map(|key| &key.encoding)
            .ok_or_else(|| AuthError::UnknownKey {
                kid: kid.to_string(),
            })
    }

    #[must_use]
    pub fn active_kid(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Registered kids, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("kids", &self.kids())
            .field("active", &self.active)
            .finish()
    }
}

#[derive(Default)]
pub struct KeyRegistryBuilder {
    keys: HashMap<String, RegisteredKey>,
    active: Option<String>,
}

impl KeyRegistryBuilder {
    /// Registers `key` under `kid`, replacing any key already using that kid.
    pub fn insert(&mut self, kid: &str, key: &SigningKey) -> Result<&mut Self, AuthError> {
        let registered = RegisteredKey::from_signing_key(kid, key)?;
        if self.keys.insert(kid.to_string(), registered).is_some() {
            debug!(kid = %kid, "Replaced signing key");
        }
        Ok(self)
    }

    /// Registers a PKCS#8 PEM encoded Ed25519 private key under `kid`.
    pub fn insert_pem(&mut self, kid: &str, pem: &str) -> Result<&mut Self, AuthError> {
        let key = decode_pem(kid, pem)?;
        self.insert(kid, &key)
    }

    pub fn active(&mut self, kid: &str) -> &mut Self {
        self.active = Some(kid.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn build(self) -> Result<KeyRegistry, AuthError> {
        let active = match self.active {
            Some(kid) if !self.keys.contains_key(&kid) => {
                return Err(AuthError::UnknownKey { kid });
            }
            Some(kid) => Some(kid),
            None if self.keys.len() == 1 => self.keys.keys().next().cloned(),
            None => None,
        };

        Ok(KeyRegistry {
            keys: self.keys,
            active,
        })
    }
}

/// Generates a fresh Ed25519 key from the OS random source.
#[must_use]
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Encodes `key` as a PKCS#8 PEM document.
pub fn encode_pem(key: &SigningKey) -> Result<String, AuthError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.as_str().to_owned())
        .map_err(|e| AuthError::key_material("<generated>", e))
}

fn decode_pem(kid: &str, pem: &str) -> Result<SigningKey, AuthError> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| AuthError::key_material(kid, e))
}
