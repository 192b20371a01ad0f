//! Credential store loaded from a flat file.
//!
//! Every line has the form `login:password`. The line is split at the first `:`, so passwords
//! may contain `:` but logins may not. Empty lines and lines without a `:` are ignored, and at
//! most [`MAXIMUM_USERS`] entries are loaded. If a login appears more than once the first entry
//! is used.
//!
//! ```
//! use vcalc::users::UserDatabase;
//! use vcalc::verifier::CredentialLookup;
//!
//! let users = UserDatabase::parse("user:P@ssW0rd\nadmin:Admin123\n");
//! assert_eq!(users.find_user("admin"), Some("Admin123"));
//! ```

use std::path::Path;

use crate::error::UserStoreError;
use crate::verifier::CredentialLookup;

/// Entries beyond this many are not loaded.
pub const MAXIMUM_USERS: usize = 100;

/// Logins and passwords in the order they appear in the file.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct UserDatabase {
    users: Vec<(String, String)>,
}

impl UserDatabase {
    /// Loads the database from `path`.
    ///
    /// # Errors
    ///
    /// If the file can not be read or is not valid UTF-8.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, UserStoreError> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|source| UserStoreError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::parse(&contents))
    }

    /// Parses the contents of a database file. Lines that do not contain an entry are skipped.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let users = contents
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .take(MAXIMUM_USERS)
            .map(|(login, password)| (login.to_owned(), password.to_owned()))
            .collect();

        Self { users }
    }

    /// Number of loaded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if no entries were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialLookup for UserDatabase {
    fn find_user(&self, login: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|(l, _)| l == login)
            .map(|(_, password)| password.as_str())
    }
}
