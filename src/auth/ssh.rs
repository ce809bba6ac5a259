//! SSH key authentication
//!
//! Nothing is sent over the network here. The key material is resolved and
//! inspected; whether the server accepts it is only known on first use.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};

use crate::core::config::SshKeyType;
use crate::error::{AuthError, ForgeError, Result};

const OPENSSH_MAGIC: &[u8] = b"openssh-key-v1\0";

/// A usable private key
#[derive(Debug, Clone)]
pub struct SshIdentity {
    pub private_key: SecretString,
    pub passphrase: Option<SecretString>,
    /// Key type, when the encoding reveals it
    pub key_type: Option<SshKeyType>,
}

/// What the key material says about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyInfo {
    key_type: Option<SshKeyType>,
    encrypted: bool,
}

/// Read key material that is either inline text or a path to a key file
pub fn load_key_material(value: &SecretString) -> Result<SecretString> {
    let raw = value.expose_secret();
    if raw.contains("-----BEGIN") {
        return Ok(value.clone());
    }

    let path = Path::new(raw.trim());
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ForgeError::from(AuthError::InvalidFormat(format!(
            "cannot read SSH key file {}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(SecretString::from(contents))
}

/// Check key material and build an identity
pub fn identity(
    private_key: SecretString,
    passphrase: Option<SecretString>,
    declared: Option<SshKeyType>,
) -> Result<SshIdentity> {
    let info = inspect(private_key.expose_secret())?;

    if info.encrypted && passphrase.is_none() {
        return Err(AuthError::InvalidFormat(
            "SSH key is encrypted but no passphrase is configured".to_string(),
        )
        .into());
    }

    if let (Some(declared), Some(actual)) = (declared, info.key_type) {
        if declared != actual {
            return Err(AuthError::InvalidFormat(format!(
                "SSH key is {:?} but key_type says {:?}",
                actual, declared
            ))
            .into());
        }
    }

    Ok(SshIdentity {
        private_key,
        passphrase,
        key_type: info.key_type.or(declared),
    })
}

fn inspect(material: &str) -> Result<KeyInfo> {
    let invalid = |reason: &str| ForgeError::from(AuthError::InvalidFormat(reason.to_string()));

    let header = material
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("-----BEGIN"))
        .ok_or_else(|| invalid("SSH key has no PEM header"))?;
    if !header.ends_with("PRIVATE KEY-----") {
        return Err(invalid("SSH key material is not a private key"));
    }

    let label = header
        .trim_start_matches("-----BEGIN ")
        .trim_end_matches(" PRIVATE KEY-----");

    let info = match label {
        "OPENSSH" => inspect_openssh(material).ok_or_else(|| invalid("malformed OpenSSH private key"))?,
        "RSA" => KeyInfo {
            key_type: Some(SshKeyType::Rsa),
            encrypted: material.contains("ENCRYPTED"),
        },
        "EC" => KeyInfo {
            key_type: Some(SshKeyType::Ecdsa),
            encrypted: material.contains("ENCRYPTED"),
        },
        "ENCRYPTED" => KeyInfo {
            key_type: None,
            encrypted: true,
        },
        _ => KeyInfo {
            key_type: None,
            encrypted: material.contains("ENCRYPTED"),
        },
    };
    Ok(info)
}

/// Decode the `openssh-key-v1` container far enough to read the cipher and
/// the public key type
fn inspect_openssh(material: &str) -> Option<KeyInfo> {
    let body: String = material
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    let bytes = STANDARD.decode(body).ok()?;

    let mut rest = bytes.strip_prefix(OPENSSH_MAGIC)?;
    let cipher = read_string(&mut rest)?;
    let _kdf = read_string(&mut rest)?;
    let _kdf_options = read_string(&mut rest)?;
    let _count = read_u32(&mut rest)?;
    let mut public_key = read_string(&mut rest)?;
    let algorithm = read_string(&mut public_key)?;

    let key_type = match algorithm {
        b"ssh-rsa" => Some(SshKeyType::Rsa),
        b"ssh-ed25519" => Some(SshKeyType::Ed25519),
        a if a.starts_with(b"ecdsa-sha2-") => Some(SshKeyType::Ecdsa),
        _ => None,
    };

    Some(KeyInfo {
        key_type,
        encrypted: cipher != b"none",
    })
}

fn read_u32(buf: &mut &[u8]) -> Option<u32> {
    let (head, tail) = buf.split_at_checked(4)?;
    *buf = tail;
    Some(u32::from_be_bytes(head.try_into().ok()?))
}

fn read_string<'a>(buf: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = read_u32(buf)? as usize;
    let (head, tail) = buf.split_at_checked(len)?;
    *buf = tail;
    Some(head)
}
