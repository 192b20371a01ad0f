//! The various errors that can happen while serving or using a connection.
//!
//! [`ConnectionError`] is an enum that can represent every way a server side connection can end
//! early. Every variant is terminal for the connection it happened on and never affects other
//! connections.
//!
//! [`MalformedAuthError`] is returned when the first message does not have the shape of either
//! auth grammar. The exact grammars are described in the [`message`](`crate::message`) module.
//!
//! [`AuthRejectedError`] is returned when a well formed claim does not match the credential store.
//!
//! [`BoundExceededError`] is returned when a declared count is larger than the configured
//! [`Limits`](crate::vector::Limits).
//!
//! [`UserStoreError`] is returned when the credential file can not be loaded, and
//! [`ClientError`] covers the client side.

use std::error::Error;
use std::fmt::{Display, Formatter, Result};
use std::io;
use std::path::PathBuf;

use crate::event::Severity;

/// Enum that covers every way a server side connection can terminate with an error.
#[derive(Debug)]
pub enum ConnectionError {
    /// The peer disconnected or the transport failed.
    Io(io::Error),
    /// The auth message has neither the delimited nor the fixed offset shape.
    MalformedAuth(MalformedAuthError),
    /// The claim was well formed but the credentials did not match.
    AuthRejected(AuthRejectedError),
    /// A declared vector count or vector length exceeds the configured maximum.
    BoundExceeded(BoundExceededError),
}

impl ConnectionError {
    /// Severity the event is logged with.
    ///
    /// Only bound violations are critical since they are the only errors that point to a
    /// deliberately hostile peer rather than an unlucky or misconfigured one.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            ConnectionError::BoundExceeded(_) => Severity::Critical,
            _ => Severity::NonCritical,
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectionError::Io(e) => Some(e),
            ConnectionError::MalformedAuth(e) => Some(e),
            ConnectionError::AuthRejected(e) => Some(e),
            ConnectionError::BoundExceeded(e) => Some(e),
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ConnectionError::Io(e) => {
                write!(f, "Connection failed: {}", e)
            }
            ConnectionError::MalformedAuth(e) => {
                write!(f, "Malformed auth message: {}", e)
            }
            ConnectionError::AuthRejected(e) => {
                write!(f, "Authentication rejected: {}", e)
            }
            ConnectionError::BoundExceeded(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MalformedAuthError> for ConnectionError {
    fn from(e: MalformedAuthError) -> Self {
        Self::MalformedAuth(e)
    }
}

impl From<AuthRejectedError> for ConnectionError {
    fn from(e: AuthRejectedError) -> Self {
        Self::AuthRejected(e)
    }
}

impl From<BoundExceededError> for ConnectionError {
    fn from(e: BoundExceededError) -> Self {
        Self::BoundExceeded(e)
    }
}

/// The field of an auth claim an error refers to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AuthField {
    /// The login name.
    Login,
    /// The 16 character hex salt.
    Salt,
    /// The 64 character hex hash.
    Hash,
}

impl Display for AuthField {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            AuthField::Login => write!(f, "login"),
            AuthField::Salt => write!(f, "salt"),
            AuthField::Hash => write!(f, "hash"),
        }
    }
}

/// Error for the [`message`](`crate::message`) module.
///
/// No partial claim is ever returned alongside this error.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MalformedAuthError {
    /// The message contains separators, but not exactly two.
    WrongSeparatorCount(usize),
    /// The login field is empty.
    EmptyLogin,
    /// The login field is not valid UTF-8.
    LoginNotUtf8,
    /// The login contains the `:` separator and can not be encoded in either grammar.
    LoginContainsSeparator,
    /// A field does not have its required length.
    FieldLength {
        /// The field with the wrong length.
        field: AuthField,
        /// The required length in bytes.
        expected: usize,
        /// The received length in bytes.
        actual: usize,
    },
    /// A hex field contains a character that is not a hex digit.
    NonHexCharacter {
        /// The field containing the character.
        field: AuthField,
        /// The offending character.
        character: char,
        /// Index of the character inside the field.
        index: usize,
    },
    /// The message has no separators and is not exactly as long as a fixed offset message.
    UnrecognizedShape {
        /// Length of the received message.
        length: usize,
    },
}

impl Error for MalformedAuthError {}

impl Display for MalformedAuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            MalformedAuthError::WrongSeparatorCount(count) => {
                write!(f, "Expected exactly 2 separators, found {}.", count)
            }
            MalformedAuthError::EmptyLogin => {
                write!(f, "Login is empty.")
            }
            MalformedAuthError::LoginNotUtf8 => {
                write!(f, "Login is not valid UTF-8.")
            }
            MalformedAuthError::LoginContainsSeparator => {
                write!(f, "Login contains the ':' separator.")
            }
            MalformedAuthError::FieldLength {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Field '{}' must be {} bytes long, was {}.",
                    field, expected, actual
                )
            }
            MalformedAuthError::NonHexCharacter {
                field,
                character,
                index,
            } => {
                write!(
                    f,
                    "Field '{}' contains non hex character {:?} at index {}.",
                    field, character, index
                )
            }
            MalformedAuthError::UnrecognizedShape { length } => {
                write!(
                    f,
                    "Message of {} bytes matches neither auth grammar.",
                    length
                )
            }
        }
    }
}

/// Error for when a well formed claim is not accepted.
///
/// The distinction between the variants is only ever logged, the peer receives the same
/// `ERR` response for both.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AuthRejectedError {
    /// No credential exists for the login.
    UnknownLogin,
    /// The claimed hash does not match the hash calculated from the stored password.
    HashMismatch,
}

impl Error for AuthRejectedError {}

impl Display for AuthRejectedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            AuthRejectedError::UnknownLogin => write!(f, "Unknown login."),
            AuthRejectedError::HashMismatch => write!(f, "Hash does not match."),
        }
    }
}

/// The count field a [`BoundExceededError`] refers to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum BoundField {
    /// The number of vectors in the batch, `N`.
    VectorCount,
    /// The number of elements in a single vector, `S`.
    VectorLength,
}

impl Display for BoundField {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            BoundField::VectorCount => write!(f, "Vector count"),
            BoundField::VectorLength => write!(f, "Vector length"),
        }
    }
}

/// A declared count is larger than the configured maximum.
///
/// Nothing covered by the count has been read when this is returned.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BoundExceededError {
    /// Which count was too large.
    pub field: BoundField,
    /// The value the peer declared.
    pub declared: u32,
    /// The configured maximum.
    pub maximum: u32,
}

impl Error for BoundExceededError {}

impl Display for BoundExceededError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{} too large: {} exceeds maximum of {}.",
            self.field, self.declared, self.maximum
        )
    }
}

/// The credential file could not be loaded.
///
/// Fatal for the server since no connection could ever be authenticated.
#[derive(Debug)]
pub struct UserStoreError {
    /// Path of the file that failed to load.
    pub path: PathBuf,
    /// The underlying error.
    pub source: io::Error,
}

impl Error for UserStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

impl Display for UserStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "Failed to load user database '{}': {}",
            self.path.display(),
            self.source
        )
    }
}

/// Errors for the [`client`](`crate::client`) module.
#[derive(Debug)]
pub enum ClientError {
    /// The connection to the server failed.
    Io(io::Error),
    /// The claim could not be encoded.
    MalformedAuth(MalformedAuthError),
    /// The server answered `ERR`.
    Rejected,
    /// The server answered something that is neither `OK` nor `ERR`.
    UnexpectedStatus([u8; 2]),
    /// More vectors, or more elements in a single vector, than a `u32` count can describe.
    BatchTooLarge {
        /// The count that does not fit.
        length: usize,
    },
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::Io(e) => Some(e),
            ClientError::MalformedAuth(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ClientError::Io(e) => write!(f, "Connection failed: {}", e),
            ClientError::MalformedAuth(e) => write!(f, "Can not encode claim: {}", e),
            ClientError::Rejected => write!(f, "Server rejected the credentials."),
            ClientError::UnexpectedStatus(status) => {
                write!(f, "Unexpected auth status: {:02x?}", status)
            }
            ClientError::BatchTooLarge { length } => {
                write!(f, "Count of {} does not fit the 32 bit wire field.", length)
            }
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MalformedAuthError> for ClientError {
    fn from(e: MalformedAuthError) -> Self {
        Self::MalformedAuth(e)
    }
}
