use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;

/// Hash a password with Argon2id and a fresh random salt. Returns a
/// PHC-format string suitable for the `password_hash` column.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("argon2 hash failed: {}", err))?
        .to_string();
    Ok(hash)
}

/// Check a plaintext password against a stored PHC-format hash.
/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    if password.is_empty() || hash.is_empty() {
        return Ok(false);
    }
    let parsed = PasswordHash::new(hash).map_err(|err| anyhow!("invalid password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_not_plaintext_and_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn empty_password_never_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("hunter2", "not-a-phc-string").is_err());
    }
}
