use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;

/// Hash a raw password into a salted PHC string for storage.
pub fn hash_password(raw: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check a raw password against a stored PHC string. A malformed stored
/// hash counts as a mismatch rather than an error.
pub fn verify_password(raw: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Pbkdf2.verify_password(raw.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Burn one hashing round. Used on login when the LRN does not exist so a
/// miss stays in the same timing class as a wrong password.
pub fn burn_hash(raw: &str) {
    let _ = hash_password(raw);
}
