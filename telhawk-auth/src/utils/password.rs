use once_cell::sync::Lazy;

/// Newtype for a cleartext password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Newtype for a bcrypt password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash verified against when login names an unknown principal, so both
/// branches pay one bcrypt invocation.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    bcrypt::hash("telhawk-dummy-credential", bcrypt::DEFAULT_COST)
        .unwrap_or_else(|_| "$2b$12$C6UzMDM.H6dfI/f/IKcEeO7ZBlOzqwy3V7e1bPteTEIWSXZCO3hG2".to_string())
});

/// Hash a password with bcrypt at the configured cost.
pub fn hash_password(password: &Password, cost: u32) -> Result<PasswordHashString, anyhow::Error> {
    let hash = bcrypt::hash(password.as_str(), cost)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(PasswordHashString::new(hash))
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &Password, hash: &PasswordHashString) -> bool {
    bcrypt::verify(password.as_str(), hash.as_str()).unwrap_or(false)
}

/// Burn one bcrypt verification against a fixed hash.
///
/// Called on the principal-not-found branch of login so its runtime is
/// indistinguishable from the wrong-password branch.
pub fn equalize_verification(password: &Password) {
    let _ = bcrypt::verify(password.as_str(), DUMMY_HASH.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = Password::new("p@ssw0rd".to_string());
        let hash = hash_password(&password, TEST_COST).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$2"));
        assert!(verify_password(&password, &hash));
    }

    #[test]
    fn wrong_password_fails_verification() {
        let password = Password::new("p@ssw0rd".to_string());
        let hash = hash_password(&password, TEST_COST).expect("Failed to hash password");

        let wrong = Password::new("not-the-password".to_string());
        assert!(!verify_password(&wrong, &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let password = Password::new("p@ssw0rd".to_string());
        let hash1 = hash_password(&password, TEST_COST).unwrap();
        let hash2 = hash_password(&password, TEST_COST).unwrap();

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_password(&password, &hash1));
        assert!(verify_password(&password, &hash2));
    }

    #[test]
    fn debug_output_redacts_cleartext() {
        let password = Password::new("super-secret".to_string());
        let debug = format!("{:?}", password);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn equalizer_never_panics() {
        equalize_verification(&Password::new("anything".to_string()));
    }
}
