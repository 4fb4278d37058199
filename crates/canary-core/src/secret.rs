use std::fmt;
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, Zeroizing};

const SECRET_LEN: usize = 1024;

/// In-memory key material mixed into every token id.
///
/// Written once at construction, read-only afterwards, zeroed by `wipe`.
/// Never persisted, never printed.
pub struct TokenSecret {
    bytes: RwLock<Zeroizing<Vec<u8>>>,
}

impl TokenSecret {
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; SECRET_LEN]);
        OsRng.fill_bytes(bytes.as_mut_slice());
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// SHA-512 over secret, nonce and username, hex encoded.
    pub fn derive_token(&self, nonce: &str, username: &str) -> Result<String> {
        let secret = self
            .bytes
            .read()
            .map_err(|e| anyhow!("Token secret lock poisoned: {}", e))?;
        if secret.is_empty() {
            return Err(anyhow!("Token secret has been wiped"));
        }

        let mut hasher = Sha512::new();
        hasher.update(secret.as_slice());
        hasher.update(nonce.as_bytes());
        hasher.update(username.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn wipe(&self) {
        match self.bytes.write() {
            Ok(mut secret) => secret.zeroize(),
            Err(poisoned) => poisoned.into_inner().zeroize(),
        }
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_depends_on_every_input() {
        let secret = TokenSecret::generate();
        let a = secret.derive_token("nonce-1", "peter").unwrap();

        assert_eq!(a.len(), 128);
        assert_eq!(a, secret.derive_token("nonce-1", "peter").unwrap());
        assert_ne!(a, secret.derive_token("nonce-2", "peter").unwrap());
        assert_ne!(a, secret.derive_token("nonce-1", "paul").unwrap());
        assert_ne!(a, TokenSecret::generate().derive_token("nonce-1", "peter").unwrap());
    }

    #[test]
    fn wiped_secret_refuses_to_derive() {
        let secret = TokenSecret::generate();
        secret.wipe();
        assert!(secret.derive_token("nonce", "peter").is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        assert_eq!(format!("{:?}", TokenSecret::generate()), "TokenSecret(<redacted>)");
    }
}
