use async_trait::async_trait;

use crate::config::Config;

/// One-time passcode check for mobile logins.
///
/// The session manager only sees pass/fail; a real OTP delivery backend
/// plugs in by implementing this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasscodeVerifier: Send + Sync {
    async fn verify(&self, identifier: &str, candidate: &str) -> bool;
}

/// Accepts a single configured code for every identifier.
pub struct StaticPasscodeVerifier {
    code: String,
}

impl StaticPasscodeVerifier {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.otp_fixed_code.clone())
    }
}

#[async_trait]
impl PasscodeVerifier for StaticPasscodeVerifier {
    async fn verify(&self, identifier: &str, candidate: &str) -> bool {
        let accepted = !self.code.is_empty() && constant_time_eq(&self.code, candidate.trim());
        if !accepted {
            tracing::debug!(identifier = %identifier, "Passcode rejected");
        }
        accepted
    }
}

fn constant_time_eq(expected: &str, candidate: &str) -> bool {
    let (expected, candidate) = (expected.as_bytes(), candidate.as_bytes());
    if expected.len() != candidate.len() {
        return false;
    }
    expected
        .iter()
        .zip(candidate)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
