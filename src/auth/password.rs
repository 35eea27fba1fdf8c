use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const SCHEME: &str = "pbkdf2";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub const DEFAULT_ROUNDS: u32 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("malformed password hash")]
    Malformed,
}

/// Hashes with a fresh random salt as `pbkdf2$<rounds>$<salt hex>$<hash hex>`.
pub fn hash_password(password: &str) -> String {
    hash_password_with_rounds(password, DEFAULT_ROUNDS)
}

pub fn hash_password_with_rounds(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);

    format!("{SCHEME}${rounds}${}${}", hex::encode(salt), hex::encode(hash))
}

pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::Malformed);
    };

    let rounds: u32 = rounds.parse().map_err(|_| PasswordError::Malformed)?;
    let salt = hex::decode(salt).map_err(|_| PasswordError::Malformed)?;
    let expected = hex::decode(expected).map_err(|_| PasswordError::Malformed)?;
    if rounds == 0 || expected.is_empty() {
        return Err(PasswordError::Malformed);
    }

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut actual);

    Ok(constant_time_eq(&actual, &expected))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUNDS: u32 = 10;

    #[test]
    fn verifies_own_hash_only() {
        let hash = hash_password_with_rounds("correct horse", ROUNDS);
        assert_eq!(verify_password("correct horse", &hash), Ok(true));
        assert_eq!(verify_password("wrong horse", &hash), Ok(false));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password_with_rounds("secret", ROUNDS);
        let second = hash_password_with_rounds("secret", ROUNDS);
        assert_ne!(first, second);
        assert!(first.starts_with("pbkdf2$10$"));
    }

    #[test]
    fn malformed_hashes_are_errors() {
        for encoded in [
            "",
            "plaintext",
            "bcrypt$10$00$00",
            "pbkdf2$x$00$00",
            "pbkdf2$10$zz$00",
            "pbkdf2$10$00$00$extra",
        ] {
            assert_eq!(
                verify_password("secret", encoded),
                Err(PasswordError::Malformed),
                "{encoded}"
            );
        }
    }
}
