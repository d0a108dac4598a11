use std::sync::{Arc, OnceLock};

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::config::Config;

/// Salted Argon2id hashing for long-term secrets.
///
/// `verify` never errors: a malformed digest is reported exactly like a wrong
/// candidate so callers cannot tell the two apart.
#[derive(Clone)]
pub struct SecretHasher {
    params: Params,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl SecretHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("Invalid password hash parameters: {}", e))?;
        Ok(Self {
            params,
            dummy_hash: Arc::new(OnceLock::new()),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.password_hash_memory_kib, config.password_hash_iterations)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, secret: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        Ok(digest.to_string())
    }

    pub fn verify(&self, digest: &str, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            tracing::warn!("Stored password digest is malformed");
            return false;
        };
        self.argon2()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spends one verification on a throwaway digest so that an unknown
    /// identity costs the same as a wrong password.
    pub fn verify_dummy(&self, candidate: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hash("sessionkeeper-dummy-secret").ok());
        if let Some(digest) = dummy {
            let _ = self.verify(digest, candidate);
        }
    }
}
