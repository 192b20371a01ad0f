//! Contains all functionality related to the client part.
//!
//! All fields of the compute phase are **big endian**.
//! See `demos/client.rs` for how to talk to a server over TCP.
//!
//! # Usage
//!
//! The [Typestate](https://yoric.github.io/post/rust-typestate/) pattern is used
//! in order to prevent incorrect use.
//! Authenticating consumes the [`ClientUser`] and returns a [`Client`], which in turn is
//! consumed by the single batch a connection allows.
//!
//! ```text
//! ClientUser -> Client -> results
//! ```
//!
//! ```no_run
//! use std::net::TcpStream;
//! use vcalc::client::ClientUser;
//! use vcalc::error::ClientError;
//! use vcalc::message::AuthGrammar;
//!
//! fn client() -> Result<(), ClientError> {
//!     let stream = TcpStream::connect("127.0.0.1:33333")?;
//!
//!     let user = ClientUser::new("user", "P@ssW0rd")?;
//!     let client = user.authenticate(stream, AuthGrammar::Delimited)?;
//!
//!     let results = client.compute(&[vec![1.0_f32, 2.0, 3.0], vec![0.5, -0.5]])?;
//!     assert_eq!(results, [14.0, 0.5]);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! * The [`AuthGrammar::FixedOffset`] grammar can only be used with logins of exactly
//! [4 bytes](crate::message::FIXED_LOGIN_LENGTH).
//! * The server closes the connection after one batch, so [`Client::compute`] can only be called
//! once per connection.

use std::io::{Read, Write};

use crate::claim::{AuthClaim, Salt};
use crate::error::{ClientError, MalformedAuthError};
use crate::message::AuthGrammar;
use crate::verifier::calculate_claim_hash;
use crate::wire::{encode_f32, read_f32, write_u32, STATUS_ERR, STATUS_OK};

/// Starting point of the client. Holds the claim that will be sent to the server.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClientUser {
    claim: AuthClaim,
}

impl ClientUser {
    /// Creates the claim for `login` and `password` with a new random salt.
    ///
    /// # Errors
    ///
    /// If the login is empty or contains `:`.
    pub fn new(login: impl Into<String>, password: &str) -> Result<Self, MalformedAuthError> {
        Self::with_specific_salt(login, password, Salt::randomized())
    }

    /// Creates the claim with a known salt. Mostly useful for testing.
    ///
    /// # Errors
    ///
    /// If the login is empty or contains `:`.
    pub fn with_specific_salt(
        login: impl Into<String>,
        password: &str,
        salt: Salt,
    ) -> Result<Self, MalformedAuthError> {
        let hash = calculate_claim_hash(&salt, password);
        let claim = AuthClaim::new(login, salt, hash)?;

        Ok(Self { claim })
    }

    /// The claim that will be sent.
    #[must_use]
    pub const fn claim(&self) -> &AuthClaim {
        &self.claim
    }

    /// The exact bytes of the auth message in `grammar`.
    ///
    /// # Errors
    ///
    /// If the login can not be encoded in `grammar`.
    pub fn auth_message(&self, grammar: AuthGrammar) -> Result<Vec<u8>, MalformedAuthError> {
        self.claim.encode(grammar)
    }

    /// Sends the claim and waits for the server to accept it.
    ///
    /// # Errors
    ///
    /// * [`ClientError::MalformedAuth`] if the claim can not be encoded in `grammar`.
    /// Nothing has been sent in this case.
    /// * [`ClientError::Rejected`] if the server answered `ERR`.
    /// * [`ClientError::UnexpectedStatus`] if the server answered anything else.
    /// * [`ClientError::Io`] if the connection failed.
    pub fn authenticate<S: Read + Write>(
        self,
        mut stream: S,
        grammar: AuthGrammar,
    ) -> Result<Client<S>, ClientError> {
        let message = self.auth_message(grammar)?;

        stream.write_all(&message)?;
        stream.flush()?;

        let mut status = [0_u8; 2];
        stream.read_exact(&mut status)?;

        if &status == STATUS_OK {
            Ok(Client { stream })
        } else if status == STATUS_ERR[..2] {
            // The server closes right after the last byte, a missing byte changes nothing.
            let mut last = [0_u8; 1];
            let _ = stream.read(&mut last);
            Err(ClientError::Rejected)
        } else {
            Err(ClientError::UnexpectedStatus(status))
        }
    }
}

/// An authenticated connection that has not sent its batch yet.
#[derive(Debug)]
pub struct Client<S> {
    stream: S,
}

impl<S: Read + Write> Client<S> {
    /// Sends every vector as a single batch and returns the sum of squares of each one.
    ///
    /// Each vector is written and its result read before the next vector is sent.
    /// An empty `vectors` sends `N = 0` and returns an empty result.
    ///
    /// # Errors
    ///
    /// * [`ClientError::BatchTooLarge`] if the number of vectors or the length of a vector does
    /// not fit a `u32`. This is checked before anything is sent.
    /// * [`ClientError::Io`] if the connection failed. The server closes the connection without
    /// an answer if a count is above its limits, which also shows up as this error.
    pub fn compute<V: AsRef<[f32]>>(mut self, vectors: &[V]) -> Result<Vec<f32>, ClientError> {
        let count = wire_count(vectors.len())?;
        for v in vectors {
            wire_count(v.as_ref().len())?;
        }

        write_u32(&mut self.stream, count)?;

        let mut results = Vec::with_capacity(vectors.len());
        let mut buffer = Vec::new();

        for v in vectors {
            let v = v.as_ref();

            buffer.clear();
            write_u32(&mut buffer, wire_count(v.len())?)?;
            for x in v {
                buffer.extend_from_slice(&encode_f32(*x));
            }

            self.stream.write_all(&buffer)?;
            self.stream.flush()?;

            results.push(read_f32(&mut self.stream)?);
        }

        Ok(results)
    }

    /// Returns the underlying stream without sending a batch.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn wire_count(length: usize) -> Result<u32, ClientError> {
    u32::try_from(length).map_err(|_| ClientError::BatchTooLarge { length })
}
