//! Decoding of the first message a client sends after connecting.
//!
//! Two grammars exist for compatibility:
//!
//! * [`AuthGrammar::Delimited`]: `login:salt:hash` with exactly two `:` separators.
//! The login is any non-empty UTF-8 string, the salt is [16 hex characters](SALT_HEX_LENGTH)
//! and the hash is [64 hex characters](HASH_HEX_LENGTH).
//! * [`AuthGrammar::FixedOffset`]: exactly [84 bytes](FIXED_MESSAGE_LENGTH) without separators,
//! split into a [4 byte login](FIXED_LOGIN_LENGTH), the salt and the hash.
//!
//! The fixed offset grammar is kept only so older clients can still connect. Its 4 byte login is
//! a historical constraint of that format and does not limit logins in the delimited grammar.
//!
//! Logins are required to be UTF-8 in both grammars, so a login of arbitrary bytes is rejected as
//! [`MalformedAuthError::LoginNotUtf8`] before any credential lookup. The peer sees `ERR` just
//! like for an unknown login, but the server reports it as a malformed message.
//!
//! A message containing a `:` is always delimited and a message without one is always fixed
//! offset, so the grammars can never both match.
//!
//! ```
//! use vcalc::message::{parse_auth_message, AuthGrammar};
//!
//! let hash = "F".repeat(64);
//! let delimited = format!("user:A1B2C3D4E5F67890:{}", hash);
//! let fixed = format!("userA1B2C3D4E5F67890{}", hash);
//!
//! let a = parse_auth_message(delimited.as_bytes()).unwrap();
//! let b = parse_auth_message(fixed.as_bytes()).unwrap();
//!
//! assert_eq!(a.grammar, AuthGrammar::Delimited);
//! assert_eq!(b.grammar, AuthGrammar::FixedOffset);
//! assert_eq!(a.claim, b.claim);
//! ```
//!
//! Parsing only validates the shape. Whether the claim is accepted is decided by the
//! [`verifier`](crate::verifier).

use std::io::{ErrorKind, Read};

use crate::claim::{AuthClaim, ClaimedHash, Salt, HASH_HEX_LENGTH, SALT_HEX_LENGTH};
use crate::error::{AuthField, MalformedAuthError};

/// Hard cap on the auth message. Reading stops here even if the message is not complete.
pub const AUTH_MESSAGE_MAX_LENGTH: usize = 256;

/// Separator between the fields of a delimited message.
pub const SEPARATOR: u8 = b':';

/// Login length in the fixed offset grammar.
pub const FIXED_LOGIN_LENGTH: usize = 4;

/// Total length of a fixed offset message.
pub const FIXED_MESSAGE_LENGTH: usize = FIXED_LOGIN_LENGTH + SALT_HEX_LENGTH + HASH_HEX_LENGTH;

/// Shortest possible delimited message: a single character login.
pub const MINIMUM_DELIMITED_LENGTH: usize = 1 + 1 + SALT_HEX_LENGTH + 1 + HASH_HEX_LENGTH;

/// The grammar an auth message was encoded with.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AuthGrammar {
    /// `login:salt:hash`.
    Delimited,
    /// Legacy 4 + 16 + 64 bytes without separators.
    FixedOffset,
}

/// A successfully parsed auth message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedAuth {
    /// The grammar the message matched.
    pub grammar: AuthGrammar,
    /// The decoded claim.
    pub claim: AuthClaim,
}

/// Decodes an auth message, trying the delimited grammar first.
///
/// # Errors
///
/// If the message matches neither grammar. See [`MalformedAuthError`] for the exact reasons.
pub fn parse_auth_message(message: &[u8]) -> Result<ParsedAuth, MalformedAuthError> {
    let (grammar, claim) = if message.contains(&SEPARATOR) {
        (AuthGrammar::Delimited, parse_delimited(message)?)
    } else if message.len() == FIXED_MESSAGE_LENGTH {
        (AuthGrammar::FixedOffset, parse_fixed_offset(message)?)
    } else {
        return Err(MalformedAuthError::UnrecognizedShape {
            length: message.len(),
        });
    };

    Ok(ParsedAuth { grammar, claim })
}

fn parse_delimited(message: &[u8]) -> Result<AuthClaim, MalformedAuthError> {
    let fields: Vec<&[u8]> = message.split(|b| *b == SEPARATOR).collect();

    match fields.as_slice() {
        [login, salt, hash] => claim_from_fields(login, salt, hash),
        _ => Err(MalformedAuthError::WrongSeparatorCount(fields.len() - 1)),
    }
}

fn parse_fixed_offset(message: &[u8]) -> Result<AuthClaim, MalformedAuthError> {
    let (login, rest) = message.split_at(FIXED_LOGIN_LENGTH);
    let (salt, hash) = rest.split_at(SALT_HEX_LENGTH);

    claim_from_fields(login, salt, hash)
}

fn claim_from_fields(
    login: &[u8],
    salt: &[u8],
    hash: &[u8],
) -> Result<AuthClaim, MalformedAuthError> {
    if login.is_empty() {
        return Err(MalformedAuthError::EmptyLogin);
    }
    let login = std::str::from_utf8(login).map_err(|_| MalformedAuthError::LoginNotUtf8)?;

    let salt = Salt::from_hex_bytes(salt)?;
    let hash = ClaimedHash::from_hex_bytes(hash)?;

    AuthClaim::new(login, salt, hash)
}

/// Returns true once `buffered` holds a full message under either grammar.
///
/// Messages with more than two separators can never become valid, so they count as complete
/// in order to be rejected without waiting for more data.
#[must_use]
pub fn auth_message_is_complete(buffered: &[u8]) -> bool {
    let separators = buffered.iter().filter(|b| **b == SEPARATOR).count();

    match separators {
        0 => buffered.len() >= FIXED_MESSAGE_LENGTH,
        1 => false,
        2 => buffered
            .iter()
            .rposition(|b| *b == SEPARATOR)
            .map_or(false, |i| buffered.len() - i - 1 >= HASH_HEX_LENGTH),
        _ => true,
    }
}

/// Returns false once no further bytes can turn `buffered` into a valid message.
///
/// Without a separator the bytes may still be the start of a delimited login, so only
/// invalid UTF-8 rules them out. After a separator the salt and hash must stay hex and the salt
/// must be exactly [`SALT_HEX_LENGTH`] characters once the second separator arrives.
#[must_use]
pub fn auth_message_is_viable(buffered: &[u8]) -> bool {
    let fields: Vec<&[u8]> = buffered.split(|b| *b == SEPARATOR).collect();

    match fields.as_slice() {
        [login] => login_prefix_is_viable(login),
        [login, salt] => login_is_valid(login) && hex_prefix_is_viable(salt, SALT_HEX_LENGTH),
        [login, salt, hash] => {
            login_is_valid(login)
                && salt.len() == SALT_HEX_LENGTH
                && hex_prefix_is_viable(salt, SALT_HEX_LENGTH)
                && hex_prefix_is_viable(hash, HASH_HEX_LENGTH)
        }
        _ => false,
    }
}

fn login_is_valid(login: &[u8]) -> bool {
    !login.is_empty() && std::str::from_utf8(login).is_ok()
}

// The read may have stopped inside a character.
fn login_prefix_is_viable(login: &[u8]) -> bool {
    std::str::from_utf8(login).map_or_else(|e| e.error_len().is_none(), |_| true)
}

fn hex_prefix_is_viable(field: &[u8], length: usize) -> bool {
    field.len() <= length && field.iter().all(u8::is_ascii_hexdigit)
}

/// Reads a single auth message, never more than [`AUTH_MESSAGE_MAX_LENGTH`] bytes.
///
/// Reading stops as soon as [`auth_message_is_complete`] is true, [`auth_message_is_viable`] is
/// false or the cap is reached. If the peer stops sending after at least one byte, the bytes
/// received so far are returned so the message can be rejected.
///
/// # Errors
///
/// Has the same errors as [`std::io::Read::read`], and returns
/// [`ErrorKind::UnexpectedEof`] if the peer closes the connection without sending anything.
pub fn read_auth_message<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut buffer = [0_u8; AUTH_MESSAGE_MAX_LENGTH];
    let mut length = 0;

    loop {
        let read = match reader.read(&mut buffer[length..]) {
            Ok(0) if length == 0 => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "connection closed before the auth message was sent",
                ))
            }
            Ok(0) => return Ok(buffer[..length].to_vec()),
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        length += read;

        let buffered = &buffer[..length];
        if length == AUTH_MESSAGE_MAX_LENGTH
            || auth_message_is_complete(buffered)
            || !auth_message_is_viable(buffered)
        {
            return Ok(buffered.to_vec());
        }
    }
}

impl AuthClaim {
    /// Encodes the claim in the requested grammar.
    ///
    /// # Errors
    ///
    /// See [`AuthClaim::to_fixed_offset`].
    pub fn encode(&self, grammar: AuthGrammar) -> Result<Vec<u8>, MalformedAuthError> {
        match grammar {
            AuthGrammar::Delimited => Ok(self.to_delimited()),
            AuthGrammar::FixedOffset => self.to_fixed_offset().map(|m| m.to_vec()),
        }
    }

    /// Encodes the claim as `login:salt:hash`.
    #[must_use]
    pub fn to_delimited(&self) -> Vec<u8> {
        format!(
            "{}:{}:{}",
            self.login(),
            self.salt().as_str(),
            self.hash().as_str()
        )
        .into_bytes()
    }

    /// Encodes the claim in the legacy fixed offset grammar.
    ///
    /// # Errors
    ///
    /// If the login is not exactly [4 bytes](FIXED_LOGIN_LENGTH).
    pub fn to_fixed_offset(&self) -> Result<[u8; FIXED_MESSAGE_LENGTH], MalformedAuthError> {
        let login = self.login().as_bytes();
        if login.len() != FIXED_LOGIN_LENGTH {
            return Err(MalformedAuthError::FieldLength {
                field: AuthField::Login,
                expected: FIXED_LOGIN_LENGTH,
                actual: login.len(),
            });
        }

        let salt_end = FIXED_LOGIN_LENGTH + SALT_HEX_LENGTH;
        let mut message = [0_u8; FIXED_MESSAGE_LENGTH];
        message[..FIXED_LOGIN_LENGTH].clone_from_slice(login);
        message[FIXED_LOGIN_LENGTH..salt_end].clone_from_slice(self.salt().as_str().as_bytes());
        message[salt_end..].clone_from_slice(self.hash().as_str().as_bytes());

        Ok(message)
    }
}
