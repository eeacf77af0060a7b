//! Traits describing backend capabilities and the shared error taxonomy.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use tokio::sync::broadcast;

use crate::model::{Bin, BinEvent, BinId, Session, TeamMember, UserId};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a configured backend.
///
/// Every backend-facing call converts its failures into one of these kinds;
/// callers never see raw transport errors. None of them is fatal — the
/// worst-case console behavior is an empty view plus a logged diagnostic.
pub enum StoreError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Backend rejected or failed the request.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Referenced record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// Insert conflicts with an existing identifier.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    /// User input failed validation; lists every violated field.
    #[error("Invalid field(s): {}", .fields.join(", "))]
    Validation {
        /// Names of the violated fields.
        fields: Vec<String>,
    },
    /// Credentials were rejected by the auth backend.
    #[error("Invalid credentials")]
    Unauthorized,
}

impl StoreError {
    /// Whether the error means the backend could not be reached at all.
    ///
    /// Console policy for these is to fall back to an empty view and log,
    /// rather than surface the failure as a user mistake.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::Backend(_))
    }
}

#[derive(Debug, Clone)]
/// Email/password pair presented at sign-in.
pub struct Credentials {
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Construct a credentials pair.
    #[must_use]
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
/// Record store holding the bin collection.
///
/// The contract mirrors what hosted record stores offer: exact-match
/// filters, ordering by the key column, single/many selects, insert and
/// update, plus a change-notification channel. Per-row writes are
/// last-write-wins; no coordination beyond that is provided.
pub trait BinStore: Send + Sync {
    /// Return every bin, ascending by id. Never mutates backend state.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    async fn list(&self) -> Result<Vec<Bin>, StoreError>;

    /// Return the enabled bins assigned to one operator, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    async fn list_for_operator(&self, operator: &UserId) -> Result<Vec<Bin>, StoreError>;

    /// Fetch a single bin by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent, or another
    /// [`StoreError`] when the query fails.
    async fn get(&self, id: &BinId) -> Result<Bin, StoreError>;

    /// Insert a new bin record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] when the id already exists, or
    /// another [`StoreError`] when the write fails.
    async fn insert(&self, bin: Bin) -> Result<Bin, StoreError>;

    /// Replace an existing bin record (last-write-wins).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent, or another
    /// [`StoreError`] when the write fails.
    async fn update(&self, bin: Bin) -> Result<Bin, StoreError>;

    /// Subscribe to change notifications for the bin collection.
    ///
    /// Delivery is at-least-once per change for a receiver that keeps up;
    /// a lagging receiver is told to resynchronize instead. No ordering is
    /// guaranteed across distinct receivers.
    fn changes(&self) -> broadcast::Receiver<BinEvent>;
}

#[async_trait]
/// Store for the static team roster with its overridable portraits.
pub trait TeamStore: Send + Sync {
    /// Return the full roster.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    async fn team(&self) -> Result<Vec<TeamMember>, StoreError>;

    /// Replace the stored portrait reference for one member.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such member exists, or
    /// another [`StoreError`] when the write fails.
    async fn update_image(&self, id: u32, image_url: &str) -> Result<TeamMember, StoreError>;
}

#[async_trait]
/// Email/password authentication against the hosted auth service.
pub trait AuthPort: Send + Sync {
    /// Exchange credentials for a session token and identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unauthorized`] when the credentials are
    /// rejected, or another [`StoreError`] when the request fails.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError>;

    /// Invalidate a session token.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the request fails.
    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError>;
}
