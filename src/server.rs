//! Contains all functionality related to the server part.
//!
//! Every connection is driven by [`handle_connection`] from the first byte to the close. The
//! handler reads a single auth message, answers `OK` or `ERR` and, if the claim was accepted,
//! runs exactly one batch of the [compute phase](crate::vector). A connection is never reused.
//!
//! The state machine goes like this:
//! ```text
//! AwaitingAuth -> Authenticated -> Streaming -> Closed
//!       |                                        ^
//!       |-----------> Rejected ------------------|
//!       |----------------------------------------|
//! ```
//! Where the direct edge from `AwaitingAuth` to `Closed` is taken when the auth message can not be
//! read at all. A message that stops short or can no longer become valid is answered with `ERR`
//! without waiting for more bytes. Every error is terminal for the connection it happened on and is reported to the
//! [`EventSink`] of the [`ServerContext`], never to other connections.
//!
//! Connections share nothing but the read only [`ServerContext`], so it is fine to hand accepted
//! streams to several threads. [`serve`] does the simplest thing and handles them one at a time.
//!
//! ```no_run
//! use std::net::TcpListener;
//! use vcalc::event::TracingSink;
//! use vcalc::server::{serve, ServerContext};
//! use vcalc::users::UserDatabase;
//! use vcalc::vector::Limits;
//!
//! # fn main() -> std::io::Result<()> {
//! let users = UserDatabase::parse("user:P@ssW0rd\n");
//! let ctx = ServerContext::new(users, TracingSink, Limits::default());
//!
//! let listener = TcpListener::bind("0.0.0.0:33333")?;
//! serve(&listener, &ctx);
//! # Ok(())
//! # }
//! ```

use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::net::TcpListener;

use crate::error::ConnectionError;
use crate::event::{EventSink, Severity};
use crate::message::{parse_auth_message, read_auth_message, AuthGrammar, ParsedAuth};
use crate::vector::{run_batch, BatchSummary, Limits};
use crate::verifier::{verify_claim, CredentialLookup};
use crate::wire::{STATUS_ERR, STATUS_OK};

/// The states a connection moves through.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SessionState {
    /// Waiting for the auth message.
    AwaitingAuth,
    /// `OK` has been sent.
    Authenticated,
    /// `ERR` has been sent.
    Rejected,
    /// The batch is being processed.
    Streaming,
    /// The connection is finished, successfully or not.
    Closed,
}

impl SessionState {
    /// Returns true if the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::AwaitingAuth, SessionState::Authenticated)
                | (SessionState::AwaitingAuth, SessionState::Rejected)
                | (SessionState::AwaitingAuth, SessionState::Closed)
                | (SessionState::Authenticated, SessionState::Streaming)
                | (SessionState::Rejected, SessionState::Closed)
                | (SessionState::Streaming, SessionState::Closed)
        )
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::AwaitingAuth => write!(f, "awaiting auth"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Rejected => write!(f, "rejected"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Everything a connection needs from the outside.
///
/// Holds no mutable state. The same context is used for every connection.
#[derive(Debug, Clone)]
pub struct ServerContext<L, E> {
    users: L,
    events: E,
    limits: Limits,
}

impl<L: CredentialLookup, E: EventSink> ServerContext<L, E> {
    /// Creates a context from a credential lookup, an event sink and the compute phase limits.
    pub const fn new(users: L, events: E, limits: Limits) -> Self {
        Self {
            users,
            events,
            limits,
        }
    }

    /// The credential lookup claims are verified against.
    pub const fn users(&self) -> &L {
        &self.users
    }

    /// The sink errors are reported to.
    pub const fn events(&self) -> &E {
        &self.events
    }

    /// Limits for the compute phase.
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// What happened on a finished connection.
#[derive(Debug)]
pub struct SessionOutcome {
    login: Option<String>,
    grammar: Option<AuthGrammar>,
    summary: Option<BatchSummary>,
    error: Option<ConnectionError>,
    history: Vec<SessionState>,
}

impl SessionOutcome {
    /// The login of the claim, if a claim could be parsed.
    /// Also set for rejected claims.
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    /// The grammar the auth message was sent in, if it could be parsed.
    pub const fn grammar(&self) -> Option<AuthGrammar> {
        self.grammar
    }

    /// The completed batch. Only set if the connection ended without an error.
    pub const fn summary(&self) -> Option<&BatchSummary> {
        self.summary.as_ref()
    }

    /// The error that ended the connection, if any.
    pub const fn error(&self) -> Option<&ConnectionError> {
        self.error.as_ref()
    }

    /// Every state the connection was in, in order. Always starts with
    /// [`SessionState::AwaitingAuth`] and ends with [`SessionState::Closed`].
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// The state the connection ended in.
    pub fn state(&self) -> SessionState {
        current_state(&self.history)
    }

    /// Returns true if the client was authenticated and the whole batch was answered.
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.summary.is_some()
    }
}

// The history starts with `AwaitingAuth` and only grows.
fn current_state(history: &[SessionState]) -> SessionState {
    history.last().copied().unwrap_or(SessionState::AwaitingAuth)
}

struct ConnectionSession {
    history: Vec<SessionState>,
    login: Option<String>,
    grammar: Option<AuthGrammar>,
}

impl ConnectionSession {
    fn new() -> Self {
        Self {
            history: vec![SessionState::AwaitingAuth],
            login: None,
            grammar: None,
        }
    }

    fn state(&self) -> SessionState {
        current_state(&self.history)
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state().can_transition_to(next),
            "invalid transition from {} to {}",
            self.state(),
            next
        );
        tracing::trace!(from = %self.state(), to = %next, "session transition");

        self.history.push(next);
    }

    fn claimed(&mut self, parsed: &ParsedAuth) {
        self.login = Some(parsed.claim.login().to_owned());
        self.grammar = Some(parsed.grammar);
    }

    fn close<E: EventSink>(
        mut self,
        events: &E,
        summary: Option<BatchSummary>,
        error: Option<ConnectionError>,
    ) -> SessionOutcome {
        if let Some(e) = &error {
            let message = match &self.login {
                Some(login) => format!("{} (login '{}', {})", e, login, self.state()),
                None => format!("{} ({})", e, self.state()),
            };
            events.record(e.severity(), &message);
        }

        self.transition(SessionState::Closed);

        SessionOutcome {
            login: self.login,
            grammar: self.grammar,
            summary,
            error,
            history: self.history,
        }
    }
}

/// Drives a single connection from the auth message to the close.
///
/// Never panics and never returns early with an error: everything that went wrong is in the
/// returned [`SessionOutcome`] and has already been reported to [`ServerContext::events`].
/// The caller only needs to drop `stream` afterwards.
pub fn handle_connection<S, L, E>(stream: &mut S, ctx: &ServerContext<L, E>) -> SessionOutcome
where
    S: Read + Write,
    L: CredentialLookup,
    E: EventSink,
{
    let mut session = ConnectionSession::new();

    let message = match read_auth_message(stream) {
        Ok(m) => m,
        Err(e) => return session.close(ctx.events(), None, Some(e.into())),
    };

    let parsed = match authenticate(&message, ctx.users(), &mut session) {
        Ok(parsed) => parsed,
        Err(e) => {
            session.transition(SessionState::Rejected);
            // The peer may already be gone, the rejection is reported either way.
            let _ = stream.write_all(STATUS_ERR).and_then(|()| stream.flush());
            return session.close(ctx.events(), None, Some(e));
        }
    };

    if let Err(e) = stream.write_all(STATUS_OK).and_then(|()| stream.flush()) {
        return session.close(ctx.events(), None, Some(e.into()));
    }
    session.transition(SessionState::Authenticated);

    tracing::debug!(
        login = parsed.claim.login(),
        grammar = ?parsed.grammar,
        "client authenticated"
    );

    session.transition(SessionState::Streaming);
    match run_batch(stream, ctx.limits()) {
        Ok(summary) => {
            tracing::debug!(
                vectors = summary.vectors,
                elements = summary.elements,
                "batch complete"
            );
            session.close(ctx.events(), Some(summary), None)
        }
        Err(e) => session.close(ctx.events(), None, Some(e)),
    }
}

fn authenticate<L: CredentialLookup>(
    message: &[u8],
    users: &L,
    session: &mut ConnectionSession,
) -> Result<ParsedAuth, ConnectionError> {
    let parsed = parse_auth_message(message)?;
    session.claimed(&parsed);

    verify_claim(&parsed.claim, users)?;

    Ok(parsed)
}

/// Accepts a single connection from `listener` and handles it to completion.
///
/// # Errors
///
/// Only if accepting fails. Errors on the accepted connection are part of the [`SessionOutcome`].
pub fn accept_connection<L, E>(
    listener: &TcpListener,
    ctx: &ServerContext<L, E>,
) -> std::io::Result<SessionOutcome>
where
    L: CredentialLookup,
    E: EventSink,
{
    let (mut stream, peer) = listener.accept()?;
    tracing::debug!(%peer, "accepted connection");

    Ok(handle_connection(&mut stream, ctx))
}

/// Accepts and handles connections one after another, forever.
///
/// Accept failures are reported as [`Severity::NonCritical`] and do not stop the loop.
pub fn serve<L, E>(listener: &TcpListener, ctx: &ServerContext<L, E>)
where
    L: CredentialLookup,
    E: EventSink,
{
    loop {
        if let Err(e) = accept_connection(listener, ctx) {
            ctx.events().record(
                Severity::NonCritical,
                &format!("Failed to accept connection: {}", e),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use crate::claim::Salt;
    use crate::client::ClientUser;
    use crate::error::{AuthRejectedError, ConnectionError, MalformedAuthError};
    use crate::event::test::RecordingSink;
    use crate::event::Severity;
    use crate::message::AuthGrammar;
    use crate::server::{handle_connection, ServerContext, SessionState};
    use crate::test::MemoryStream;
    use crate::vector::Limits;
    use crate::wire::{encode_f32, write_u32};
    use std::collections::HashMap;

    const SALT: &str = "A1B2C3D4E5F67890";

    fn context(limits: Limits) -> ServerContext<HashMap<String, String>, RecordingSink> {
        let mut users = HashMap::new();
        users.insert("user".to_owned(), "pw".to_owned());
        ServerContext::new(users, RecordingSink::default(), limits)
    }

    fn auth(login: &str, password: &str, grammar: AuthGrammar) -> Vec<u8> {
        ClientUser::with_specific_salt(login, password, Salt::from_hex(SALT).unwrap())
            .unwrap()
            .auth_message(grammar)
            .unwrap()
    }

    fn batch(vectors: &[&[f32]]) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, vectors.len() as u32).unwrap();
        for v in vectors {
            write_u32(&mut out, v.len() as u32).unwrap();
            for x in *v {
                out.extend_from_slice(&encode_f32(*x));
            }
        }
        out
    }

    #[test]
    fn transitions() {
        use SessionState::*;

        assert!(AwaitingAuth.can_transition_to(Authenticated));
        assert!(AwaitingAuth.can_transition_to(Rejected));
        assert!(AwaitingAuth.can_transition_to(Closed));
        assert!(Authenticated.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Closed));
        assert!(Rejected.can_transition_to(Closed));

        assert!(!Rejected.can_transition_to(Streaming));
        assert!(!Closed.can_transition_to(AwaitingAuth));
        assert!(!Streaming.can_transition_to(Authenticated));
        assert!(!AwaitingAuth.can_transition_to(Streaming));
    }

    #[test]
    fn accepted_claim_runs_batch() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "pw", AuthGrammar::Delimited),
            batch(&[&[1.0, 2.0, 3.0]]),
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        assert!(outcome.is_success());
        assert_eq!(stream.written(), [b'O', b'K', 0x41, 0x60, 0x00, 0x00]);
        assert_eq!(outcome.state(), SessionState::Closed);
        assert_eq!(outcome.grammar(), Some(AuthGrammar::Delimited));
        assert_eq!(outcome.summary().map(|s| s.elements), Some(3));
        assert!(ctx.events().events().is_empty());
    }

    #[test]
    fn empty_batch_closes_cleanly() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "pw", AuthGrammar::Delimited),
            batch(&[]),
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        assert!(outcome.is_success());
        assert_eq!(stream.written(), b"OK");
    }

    #[test]
    fn wrong_password_gets_err() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "not pw", AuthGrammar::Delimited),
            batch(&[&[1.0]]),
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        assert_eq!(stream.written(), b"ERR");
        assert!(matches!(
            outcome.error(),
            Some(ConnectionError::AuthRejected(AuthRejectedError::HashMismatch))
        ));
        assert_eq!(outcome.login(), Some("user"));
        assert_eq!(
            outcome.history(),
            [
                SessionState::AwaitingAuth,
                SessionState::Rejected,
                SessionState::Closed
            ]
        );
        // Nothing after the auth message is read.
        assert_eq!(stream.unread(), batch(&[&[1.0]]));
    }

    #[test]
    fn unknown_login_gets_err() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::new(auth("nobody", "pw", AuthGrammar::Delimited));

        let outcome = handle_connection(&mut stream, &ctx);

        assert_eq!(stream.written(), b"ERR");
        assert!(matches!(
            outcome.error(),
            Some(ConnectionError::AuthRejected(AuthRejectedError::UnknownLogin))
        ));
        assert_eq!(ctx.events().events()[0].0, Severity::NonCritical);
    }

    #[test]
    fn malformed_message_gets_err() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::new(b"user:A1B2:nothex:extra".to_vec());

        let outcome = handle_connection(&mut stream, &ctx);

        assert_eq!(stream.written(), b"ERR");
        assert!(matches!(
            outcome.error(),
            Some(ConnectionError::MalformedAuth(
                MalformedAuthError::WrongSeparatorCount(3)
            ))
        ));
        assert_eq!(outcome.login(), None);
        assert_eq!(outcome.state(), SessionState::Closed);
    }

    #[test]
    fn legacy_grammar_is_accepted() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "pw", AuthGrammar::FixedOffset),
            batch(&[&[2.0]]),
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        assert!(outcome.is_success());
        assert_eq!(outcome.grammar(), Some(AuthGrammar::FixedOffset));
        assert_eq!(&stream.written()[2..], encode_f32(4.0));
    }

    #[test]
    fn unviable_prefix_gets_err_without_waiting() {
        for prefix in [&b"user:A1B2C3D4E5F6789Z"[..], &b"user:XYZ:abc"[..], &b":"[..]] {
            let ctx = context(Limits::default());
            let mut stream =
                MemoryStream::from_chunks(vec![prefix.to_vec(), b"never read".to_vec()]);

            let outcome = handle_connection(&mut stream, &ctx);

            assert_eq!(stream.written(), b"ERR");
            assert!(matches!(
                outcome.error(),
                Some(ConnectionError::MalformedAuth(_))
            ));
            assert_eq!(
                outcome.history(),
                [
                    SessionState::AwaitingAuth,
                    SessionState::Rejected,
                    SessionState::Closed
                ]
            );
            assert_eq!(stream.unread(), b"never read");
        }
    }

    #[test]
    fn truncated_message_gets_err() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::new(b"user:A1B2C3D4E5F67890:ABCD".to_vec());

        let outcome = handle_connection(&mut stream, &ctx);

        assert_eq!(stream.written(), b"ERR");
        assert!(matches!(
            outcome.error(),
            Some(ConnectionError::MalformedAuth(
                MalformedAuthError::FieldLength { .. }
            ))
        ));
    }

    #[test]
    fn closed_before_auth_sends_nothing() {
        let ctx = context(Limits::default());
        let mut stream = MemoryStream::new(Vec::new());

        let outcome = handle_connection(&mut stream, &ctx);

        assert!(stream.written().is_empty());
        assert!(matches!(outcome.error(), Some(ConnectionError::Io(_))));
        assert_eq!(
            outcome.history(),
            [SessionState::AwaitingAuth, SessionState::Closed]
        );

        let events = ctx.events().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::NonCritical);
    }

    #[test]
    fn bound_violation_is_critical() {
        let ctx = context(Limits {
            max_vectors: 4,
            max_vector_length: 2,
        });
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "pw", AuthGrammar::Delimited),
            batch(&[&[1.0, 1.0], &[1.0, 1.0, 1.0]]),
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        // The first vector is answered before the second count is seen.
        assert_eq!(&stream.written()[..2], b"OK");
        assert_eq!(&stream.written()[2..], encode_f32(2.0));
        assert!(matches!(
            outcome.error(),
            Some(ConnectionError::BoundExceeded(_))
        ));
        assert_eq!(outcome.summary(), None);
        assert_eq!(
            outcome.history(),
            [
                SessionState::AwaitingAuth,
                SessionState::Authenticated,
                SessionState::Streaming,
                SessionState::Closed
            ]
        );

        let events = ctx.events().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Severity::Critical);
        assert!(events[0].1.contains("Vector length"), "{}", events[0].1);
    }

    #[test]
    fn disconnect_during_batch_is_not_critical() {
        let ctx = context(Limits::default());
        let mut partial = batch(&[&[1.0, 2.0]]);
        partial.truncate(partial.len() - 1);
        let mut stream = MemoryStream::from_chunks(vec![
            auth("user", "pw", AuthGrammar::Delimited),
            partial,
        ]);

        let outcome = handle_connection(&mut stream, &ctx);

        assert_eq!(stream.written(), b"OK");
        assert!(matches!(outcome.error(), Some(ConnectionError::Io(_))));
        assert_eq!(ctx.events().events()[0].0, Severity::NonCritical);
    }
}
