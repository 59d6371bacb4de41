use bcrypt::{hash, verify, BcryptError, HashParts, DEFAULT_COST};

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

/// Check `password` against a stored bcrypt hash.
///
/// An unparseable hash never matches. bcrypt compares digests in constant time.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match verify(password, password_hash) {
        Ok(matches) => matches,
        Err(err) => {
            tracing::warn!("stored password hash could not be checked: {err}");
            false
        }
    }
}

/// Whether `candidate` has the shape of a bcrypt hash (`$2b$12$...`).
pub fn is_bcrypt_hash(candidate: &str) -> bool {
    candidate.parse::<HashParts>().is_ok()
}
