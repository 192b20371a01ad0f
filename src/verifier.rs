//! Decides whether an [`AuthClaim`] is accepted.
//!
//! The hash a client must send is calculated as `upper_hex( SHA256( salt | password ) )` where
//! `salt` is the 16 character salt field exactly as transmitted (not its decoded bytes) and
//! `password` is the stored password. The comparison with the claimed hash is case sensitive, so
//! a hash sent as lowercase hex is well formed but never accepted.
//!
//! ```
//! use std::collections::HashMap;
//! use vcalc::claim::{AuthClaim, Salt};
//! use vcalc::verifier::{calculate_claim_hash, verify};
//!
//! let mut users = HashMap::new();
//! users.insert("user".to_string(), "pw".to_string());
//!
//! let salt = Salt::from_hex("A1B2C3D4E5F67890").unwrap();
//! let hash = calculate_claim_hash(&salt, "pw");
//! let claim = AuthClaim::new("user", salt, hash).unwrap();
//!
//! assert!(verify(&claim, &users));
//! ```
//!
//! Verification has no side effects: there is no lockout and nothing is logged from here.

use std::collections::HashMap;
use std::hash::BuildHasher;

use subtle::ConstantTimeEq;

use crate::claim::{AuthClaim, ClaimedHash, Salt};
use crate::error::AuthRejectedError;
use crate::sha256::Sha256;

/// Read only access to stored passwords.
///
/// Implementations are shared between connections and must not require mutation.
pub trait CredentialLookup {
    /// Returns the password for `login`, if the login exists.
    fn find_user(&self, login: &str) -> Option<&str>;
}

impl<T: CredentialLookup + ?Sized> CredentialLookup for &T {
    fn find_user(&self, login: &str) -> Option<&str> {
        (**self).find_user(login)
    }
}

impl<S: BuildHasher> CredentialLookup for HashMap<String, String, S> {
    fn find_user(&self, login: &str) -> Option<&str> {
        self.get(login).map(String::as_str)
    }
}

/// Calculates the hash a client with `password` must claim for `salt`.
///
/// `H( salt | password )` hex encoded with uppercase letters.
#[must_use]
pub fn calculate_claim_hash(salt: &Salt, password: &str) -> ClaimedHash {
    let digest = Sha256::new()
        .chain(salt.as_str())
        .chain(password)
        .finalize();

    ClaimedHash::from_digest(&digest)
}

/// Verifies `claim` against `users`, returning why it was rejected.
///
/// # Errors
///
/// * [`AuthRejectedError::UnknownLogin`] if `users` has no entry for the login.
/// * [`AuthRejectedError::HashMismatch`] if the claimed hash is not the expected one.
pub fn verify_claim<L: CredentialLookup + ?Sized>(
    claim: &AuthClaim,
    users: &L,
) -> Result<(), AuthRejectedError> {
    let password = users
        .find_user(claim.login())
        .ok_or(AuthRejectedError::UnknownLogin)?;

    let expected = calculate_claim_hash(claim.salt(), password);
    let expected = expected.as_str().as_bytes();
    let claimed = claim.hash().as_str().as_bytes();

    if expected.len() == claimed.len() && bool::from(expected.ct_eq(claimed)) {
        Ok(())
    } else {
        Err(AuthRejectedError::HashMismatch)
    }
}

/// Returns true if `claim` is accepted by `users`.
///
/// Convenience wrapper around [`verify_claim`].
#[must_use]
pub fn verify<L: CredentialLookup + ?Sized>(claim: &AuthClaim, users: &L) -> bool {
    verify_claim(claim, users).is_ok()
}

#[cfg(test)]
mod test {
    use crate::claim::{AuthClaim, ClaimedHash, Salt};
    use crate::error::AuthRejectedError;
    use crate::sha256::digest;
    use crate::verifier::{calculate_claim_hash, verify, verify_claim, CredentialLookup};
    use std::collections::HashMap;

    fn users() -> HashMap<String, String> {
        let mut users = HashMap::new();
        users.insert("user".to_owned(), "P@ssW0rd".to_owned());
        users.insert("admin".to_owned(), "Admin123".to_owned());
        users.insert("test".to_owned(), "Test456".to_owned());
        users
    }

    fn claim(login: &str, salt: &str, password: &str) -> AuthClaim {
        let salt = Salt::from_hex(salt).unwrap();
        let hash = calculate_claim_hash(&salt, password);
        AuthClaim::new(login, salt, hash).unwrap()
    }

    #[test]
    fn hash_is_over_salt_text_and_password() {
        let salt = Salt::from_hex("A1B2C3D4E5F67890").unwrap();
        assert_eq!(
            calculate_claim_hash(&salt, "pw").as_str(),
            digest(b"A1B2C3D4E5F67890pw").to_hex_upper()
        );

        // The salt text is hashed as sent, so case changes the hash.
        let lower = Salt::from_hex("a1b2c3d4e5f67890").unwrap();
        assert_ne!(
            calculate_claim_hash(&lower, "pw"),
            calculate_claim_hash(&salt, "pw")
        );
    }

    #[test]
    fn accepts_correct_credentials() {
        let users = users();
        assert!(verify(&claim("user", "A1B2C3D4E5F67890", "P@ssW0rd"), &users));
        assert_eq!(
            verify_claim(&claim("admin", "0123456789ABCDEF", "Admin123"), &users),
            Ok(())
        );
    }

    #[test]
    fn rejects_unknown_login() {
        let users = users();
        assert_eq!(
            verify_claim(&claim("nonexistent", "A1B2C3D4E5F67890", "P@ssW0rd"), &users),
            Err(AuthRejectedError::UnknownLogin)
        );
    }

    #[test]
    fn rejects_everything_with_empty_store() {
        let empty: HashMap<String, String> = HashMap::new();
        assert!(!verify(
            &claim("user", "A1B2C3D4E5F67890", "P@ssW0rd"),
            &empty
        ));
    }

    #[test]
    fn rejects_wrong_hash() {
        let users = users();
        let salt = Salt::from_hex("A1B2C3D4E5F67890").unwrap();
        let wrong = ClaimedHash::from_hex(
            "0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF",
        )
        .unwrap();
        let mismatched = AuthClaim::new("user", salt, wrong).unwrap();

        assert_eq!(
            verify_claim(&mismatched, &users),
            Err(AuthRejectedError::HashMismatch)
        );
        assert!(!verify(
            &claim("user", "A1B2C3D4E5F67890", "wrong"),
            &users
        ));
    }

    #[test]
    fn rejects_lowercase_hash() {
        let users = users();
        let salt = Salt::from_hex("A1B2C3D4E5F67890").unwrap();
        let upper = calculate_claim_hash(&salt, "P@ssW0rd");
        let lower = ClaimedHash::from_hex(&upper.as_str().to_ascii_lowercase()).unwrap();

        let claim = AuthClaim::new("user", salt, lower).unwrap();
        assert_eq!(
            verify_claim(&claim, &users),
            Err(AuthRejectedError::HashMismatch)
        );
    }

    #[test]
    fn different_salts_give_different_hashes() {
        let a = Salt::from_hex("A1B2C3D4E5F67890").unwrap();
        let b = Salt::from_hex("5A171234567890AB").unwrap();

        let hash_a = calculate_claim_hash(&a, "P@ssW0rd");
        let hash_b = calculate_claim_hash(&b, "P@ssW0rd");
        assert_ne!(hash_a, hash_b);

        // A hash is only valid together with the salt it was made with.
        let replayed = AuthClaim::new("user", b, hash_a).unwrap();
        assert!(!verify(&replayed, &users()));
    }

    #[test]
    fn several_users_each_verify() {
        let users = users();
        for (login, password) in users.iter() {
            let claim = claim(login, "0000000000000000", password);
            assert!(verify(&claim, &users), "login: {}", login);
        }
    }

    #[test]
    fn lookup_through_reference() {
        let users = users();
        let by_ref: &dyn CredentialLookup = &users;
        assert_eq!(by_ref.find_user("admin"), Some("Admin123"));
        assert_eq!(by_ref.find_user("nobody"), None);
    }
}
