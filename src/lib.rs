//! A minimal authenticated compute service.
//!
//! A client connects over a stream transport, proves knowledge of a password with a salted hash
//! and then sends a single batch of `f32` vectors. The server answers every vector with the sum
//! of its squared elements.
//!
//! The crate does not open sockets or files by itself except in [`server::serve`] and
//! [`users::UserDatabase::from_file`]. Everything else works on any [`std::io::Read`] +
//! [`std::io::Write`] stream, which is also how the tests drive it.
//!
//! **THE PROTOCOL HAS NO TRANSPORT ENCRYPTION. THE HASH ONLY PROVES KNOWLEDGE OF THE PASSWORD
//! AND CAN BE REPLAYED BY ANYONE WHO OBSERVES IT TOGETHER WITH ITS SALT.**
//!
//! # Usage
//!
//! The crate is split into:
//! * A [`server`] module that drives a connection from the auth message to the close.
//! * A [`client`] module for authenticating and sending a batch.
//! * A [`message`] module with the two auth message grammars.
//! * A [`verifier`] module that decides whether a claim is accepted.
//! * A [`vector`] module with the compute phase.
//! * A [`sha256`] module containing the hash used for claims.
//! * An [`error`] module for errors that are shared by all modules.
//!
//! A server example can be found in `demos/server.rs`
//! and a client example can be found in `demos/client.rs`.
//!
//! ## Running the examples
//!
//! 1. Create a user database, for example `echo 'user:P@ssW0rd' > users.conf`.
//! 2. Run the server with `cargo run --example server -- -d users.conf -l vcalc.log`.
//! 3. Run the client with `cargo run --example client -- 127.0.0.1 33333 user P@ssW0rd`.
//!
//! # Protocol
//!
//! ```text
//! C -> S: login:salt:hash          (or the legacy 84 byte fixed offset form)
//! S -> C: OK | ERR
//! C -> S: N
//! C -> S: S, x_1 .. x_S            S -> C: sum of squares     (N times)
//! ```
//!
//! The auth message is described in [`message`], the hash in [`verifier`] and the compute phase
//! in [`vector`]. All integers and floats of the compute phase are big endian.

#![forbid(unsafe_code)]
#![warn(
    clippy::perf,
    clippy::correctness,
    clippy::style,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::unseparated_literal_suffix,
    missing_docs
)]

pub use claim::HASH_HEX_LENGTH;
pub use claim::SALT_HEX_LENGTH;
pub use claim::SALT_LENGTH;
pub use message::AUTH_MESSAGE_MAX_LENGTH;
pub use sha256::DIGEST_LENGTH;
pub use vector::MAXIMUM_VECTORS;
pub use vector::MAXIMUM_VECTOR_LENGTH;

pub mod claim;
pub mod client;
pub mod error;
pub mod event;
pub(crate) mod hex;
pub mod message;
pub mod server;
pub mod sha256;
pub mod users;
pub mod vector;
pub mod verifier;
pub mod wire;
