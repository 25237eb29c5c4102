// crates/coinload-core/src/credentials.rs
// ============================================================================
// Module: Credential Store
// Description: Fixed pool of synthetic user identities.
// Purpose: Generate deterministic usernames once and share them read-only.
// Dependencies: rand, thiserror
// ============================================================================

//! ## Overview
//! The credential pool is generated once at startup and never mutated, so
//! concurrent iterations read it without locks. Usernames follow the
//! `<prefix><index>` pattern and every user shares the same password.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default username prefix for generated users.
pub const DEFAULT_USERNAME_PREFIX: &str = "stress_test_user_";
/// Default shared password for generated users.
pub const DEFAULT_PASSWORD: &str = "1Test!Password49";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Synthetic user identity used to drive load.
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredential {
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable pool of generated users.
///
/// # Invariants
/// - The pool is never empty.
/// - Usernames are unique and ordered by index.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    /// Generated users in index order.
    users: Vec<UserCredential>,
}

/// Credential pool construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// A pool needs at least one user.
    #[error("credential pool requires at least one user")]
    EmptyPool,
}

impl CredentialPool {
    /// Generates `count` users named `<prefix><i>` sharing `password`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::EmptyPool`] when `count` is zero.
    pub fn generate(count: usize, prefix: &str, password: &str) -> Result<Self, CredentialError> {
        if count == 0 {
            return Err(CredentialError::EmptyPool);
        }
        let users = (0..count)
            .map(|index| UserCredential {
                username: format!("{prefix}{index}"),
                password: password.to_string(),
            })
            .collect();
        Ok(Self {
            users,
        })
    }

    /// Returns the number of users in the pool.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.users.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Returns the user at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&UserCredential> {
        self.users.get(index)
    }

    /// Returns all users in index order.
    #[must_use]
    pub fn users(&self) -> &[UserCredential] {
        &self.users
    }

    /// Picks a user uniformly at random.
    #[must_use]
    pub fn pick(&self) -> &UserCredential {
        let index = rand::thread_rng().gen_range(0..self.users.len());
        &self.users[index]
    }

    /// Picks an acting user and a transfer recipient independently.
    ///
    /// The two may be the same user.
    #[must_use]
    pub fn pick_pair(&self) -> (&UserCredential, &UserCredential) {
        (self.pick(), self.pick())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
