use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Argon2id cost parameters. The defaults follow the OWASP minimum
/// (19 MiB, two passes, one lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Config {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19_456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Config {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_cost_kib, self.time_cost, self.parallelism, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Produces PHC strings for new passwords and checks candidates against
/// stored ones. Verification reads the cost parameters from the stored
/// hash, so raising the defaults does not lock out existing accounts.
pub struct PasswordHasher2 {
    argon2: Argon2<'static>,
}

impl PasswordHasher2 {
    pub fn new(config: Argon2Config) -> Result<Self> {
        Ok(Self {
            argon2: config.hasher()?,
        })
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {e}"))
    }

    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| anyhow!("Stored hash is not a PHC string: {e}"))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {e}")),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    PasswordHasher2::new(Argon2Config::default())?.hash(password)
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    PasswordHasher2::new(Argon2Config::default())?.verify(password, stored)
}

/// Returns the reason a password is refused, if any.
pub fn check_password_policy(password: &str) -> Option<String> {
    match password.chars().count() {
        n if n < MIN_PASSWORD_LENGTH => Some(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )),
        n if n > MAX_PASSWORD_LENGTH => Some(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )),
        _ => None,
    }
}
