//! The unverified `(login, salt, hash)` tuple a client sends when connecting.
//!
//! Every type in this module can only be constructed from well formed values, so an
//! [`AuthClaim`] that exists always has a non-empty login, a salt of exactly
//! [16 hex characters](SALT_HEX_LENGTH) and a hash of exactly [64 hex characters](HASH_HEX_LENGTH).

use rand::{thread_rng, RngCore};

use crate::error::{AuthField, MalformedAuthError};
use crate::hex::{hex_decode_field, hex_encode_upper};
use crate::sha256::{Digest, DIGEST_LENGTH};

/// Raw salt size. The salt is transmitted as twice as many hex characters.
#[doc(alias = "salt")]
pub const SALT_LENGTH: u8 = 8;

/// Length of the salt field on the wire.
pub const SALT_HEX_LENGTH: usize = SALT_LENGTH as usize * 2;

/// Length of the hash field on the wire.
pub const HASH_HEX_LENGTH: usize = DIGEST_LENGTH as usize * 2;

/// Random value mixed into the password before hashing.
///
/// The text is kept exactly as transmitted since the claim hash is calculated over the text,
/// not over the decoded bytes.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Salt {
    text: String,
    bytes: [u8; SALT_LENGTH as usize],
}

impl Salt {
    /// Parses a salt field. Upper and lower case hex digits are both accepted and preserved.
    ///
    /// # Errors
    ///
    /// If the field is not exactly [16](SALT_HEX_LENGTH) hex characters.
    pub fn from_hex(s: &str) -> Result<Self, MalformedAuthError> {
        Self::from_hex_bytes(s.as_bytes())
    }

    pub(crate) fn from_hex_bytes(s: &[u8]) -> Result<Self, MalformedAuthError> {
        let mut bytes = [0_u8; SALT_LENGTH as usize];
        hex_decode_field(AuthField::Salt, s, &mut bytes)?;

        // Only ASCII hex digits remain at this point.
        let text = s.iter().map(|b| char::from(*b)).collect();

        Ok(Self { text, bytes })
    }

    /// Creates a salt from raw bytes, encoded as uppercase hex.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SALT_LENGTH as usize]) -> Self {
        Self {
            text: hex_encode_upper(&bytes),
            bytes,
        }
    }

    /// Creates a salt from the thread local random number generator.
    #[must_use]
    pub fn randomized() -> Self {
        let mut bytes = [0_u8; SALT_LENGTH as usize];
        thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// The salt exactly as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The decoded salt bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SALT_LENGTH as usize] {
        &self.bytes
    }
}

/// The 64 hex character hash a client claims to have calculated.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ClaimedHash {
    text: String,
}

impl ClaimedHash {
    /// Parses a hash field. Upper and lower case hex digits are both accepted and preserved.
    ///
    /// # Errors
    ///
    /// If the field is not exactly [64](HASH_HEX_LENGTH) hex characters.
    pub fn from_hex(s: &str) -> Result<Self, MalformedAuthError> {
        Self::from_hex_bytes(s.as_bytes())
    }

    pub(crate) fn from_hex_bytes(s: &[u8]) -> Result<Self, MalformedAuthError> {
        let mut bytes = [0_u8; DIGEST_LENGTH as usize];
        hex_decode_field(AuthField::Hash, s, &mut bytes)?;

        Ok(Self {
            text: s.iter().map(|b| char::from(*b)).collect(),
        })
    }

    /// The uppercase hex form of `digest`, which is the only form a server accepts.
    #[must_use]
    pub fn from_digest(digest: &Digest) -> Self {
        Self {
            text: digest.to_hex_upper(),
        }
    }

    /// The hash exactly as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Login, salt and hash received from a client, not yet verified.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AuthClaim {
    login: String,
    salt: Salt,
    hash: ClaimedHash,
}

impl AuthClaim {
    /// Combines already validated fields.
    ///
    /// # Errors
    ///
    /// If the login is empty or contains the `:` separator.
    pub fn new(
        login: impl Into<String>,
        salt: Salt,
        hash: ClaimedHash,
    ) -> Result<Self, MalformedAuthError> {
        let login = login.into();

        if login.is_empty() {
            return Err(MalformedAuthError::EmptyLogin);
        }
        if login.contains(':') {
            return Err(MalformedAuthError::LoginContainsSeparator);
        }

        Ok(Self { login, salt, hash })
    }

    /// The claimed login.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// The salt the hash was calculated with.
    #[must_use]
    pub const fn salt(&self) -> &Salt {
        &self.salt
    }

    /// The claimed hash.
    #[must_use]
    pub const fn hash(&self) -> &ClaimedHash {
        &self.hash
    }
}
