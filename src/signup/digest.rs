use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::DigestConfig;

fn hasher(cost: &DigestConfig) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
        .map_err(|e| anyhow::anyhow!("invalid digest cost parameters: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// One-way digest of `plain` under a fresh random salt. The returned PHC
/// string embeds algorithm, version, cost, and salt, so verification needs
/// no extra state.
pub fn digest_value(plain: &str, cost: &DigestConfig) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = hasher(cost)?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 digest error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(digest)
}

/// Digest of a client IP mixed with the server-side salt. Verifying later
/// requires the same salt appended to the candidate address.
pub fn digest_ip(ip: &str, server_salt: &str, cost: &DigestConfig) -> anyhow::Result<String> {
    digest_value(&format!("{}{}", ip, server_salt), cost)
}

/// True iff `digest` was produced from `plain`. Cost parameters are read
/// back from the digest itself.
pub fn verify_digest(plain: &str, digest: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(digest).map_err(|e| {
        error!(error = %e, "argon2 parse digest error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
