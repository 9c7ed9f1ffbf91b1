use argon2::{Argon2, PasswordHash, PasswordVerifier};

use crate::error::{AppError, AppResult};

/// Shared admin password checked once per session after the admin gate.
#[derive(Clone)]
pub struct AdminPassword {
    hash: String,
}

impl AdminPassword {
    /// `hash` must be an argon2 PHC string.
    pub fn new(hash: &str) -> AppResult<Self> {
        PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("invalid admin password hash: {}", e)))?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }

    pub fn verify(&self, candidate: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminPassword").finish_non_exhaustive()
    }
}
