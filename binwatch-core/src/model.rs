//! Domain data structures for bins, users, and dashboard aggregates.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepts the usual `local-part@domain.tld` shape; anything fancier is the
/// auth backend's problem.
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern must compile")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a single waste bin.
pub struct BinId(pub String);

impl fmt::Display for BinId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a user account known to the auth backend.
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Severity level derived from a bin's compartment readings.
pub enum Status {
    /// All compartments below the warning band.
    Normal,
    /// At least one compartment at 70% or above.
    Warning,
    /// At least one compartment at 90% or above.
    Full,
}

impl Status {
    /// Derive the severity from a set of compartment readings.
    ///
    /// Only the maximum fill level matters: `>= 90` is [`Status::Full`],
    /// `>= 70` is [`Status::Warning`], everything below is
    /// [`Status::Normal`]. An empty list derives [`Status::Normal`] — a bin
    /// without readings has nothing to alert on.
    #[must_use]
    pub fn derive(compartments: &[Compartment]) -> Self {
        let max_fill = compartments
            .iter()
            .map(|compartment| compartment.fill_level)
            .max()
            .unwrap_or(0);

        if max_fill >= 90 {
            Status::Full
        } else if max_fill >= 70 {
            Status::Warning
        } else {
            Status::Normal
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Normal => "NORMAL",
            Status::Warning => "WARNING",
            Status::Full => "FULL",
        };
        write!(formatter, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One waste-category sensor reading inside a bin.
pub struct Compartment {
    /// Identifier unique within the bin.
    pub id: String,
    /// Waste category label, e.g. "Organic".
    pub name: String,
    /// Current fill percentage, `0..=100`.
    pub fill_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A physical waste container and its sensor state.
pub struct Bin {
    /// Unique identifier.
    pub id: BinId,
    /// Human-friendly site name.
    pub location_name: String,
    /// Street address of the site.
    pub address: String,
    /// Site latitude.
    pub latitude: f64,
    /// Site longitude.
    pub longitude: f64,
    /// Cached severity; readers re-derive from `compartments` instead of
    /// trusting this field.
    pub status: Status,
    /// Whether the bin participates in dashboards and assignments.
    pub enabled: bool,
    /// When the bin was last emptied.
    pub last_emptied: DateTime<Utc>,
    /// Operator responsible for emptying this bin, if assigned.
    pub assigned_operator_id: Option<UserId>,
    /// Contact address of the local body responsible for the site.
    pub local_body_email: String,
    /// Per-category sensor readings.
    pub compartments: Vec<Compartment>,
}

impl Bin {
    /// Re-derive `status` from the current compartment readings.
    pub fn refresh_status(&mut self) {
        self.status = Status::derive(&self.compartments);
    }

    /// Highest fill level across all compartments, 0 when there are none.
    #[must_use]
    pub fn max_fill(&self) -> u8 {
        self.compartments
            .iter()
            .map(|compartment| compartment.fill_level)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
/// Input for registering a new bin.
pub struct NewBin {
    /// Requested unique identifier.
    pub id: String,
    /// Human-friendly site name.
    pub location_name: String,
    /// Street address of the site.
    pub address: String,
    /// Site latitude.
    pub latitude: f64,
    /// Site longitude.
    pub longitude: f64,
    /// Contact address of the local body responsible for the site.
    pub local_body_email: String,
    /// Operator to assign, if any.
    pub assigned_operator_id: Option<UserId>,
}

impl NewBin {
    /// Check the registration input.
    ///
    /// # Errors
    ///
    /// Returns the names of every violated field: `id`, `location_name` and
    /// `address` must be non-empty, `local_body_email` must look like an
    /// email address.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut fields = Vec::new();

        if self.id.trim().is_empty() {
            fields.push(String::from("id"));
        }
        if self.location_name.trim().is_empty() {
            fields.push(String::from("location_name"));
        }
        if self.address.trim().is_empty() {
            fields.push(String::from("address"));
        }
        if !EMAIL_SHAPE.is_match(self.local_body_email.trim()) {
            fields.push(String::from("local_body_email"));
        }

        if fields.is_empty() { Ok(()) } else { Err(fields) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Role attached to a user account; governs which console is reachable.
pub enum UserRole {
    /// Full dashboard, bin registration, team settings.
    Admin,
    /// Field role, sees only assigned bins.
    Operator,
    /// Authenticated but without a console.
    Guest,
}

impl UserRole {
    /// Normalize a raw role string from the auth backend.
    ///
    /// Matching is case-insensitive after trimming; unknown values fall back
    /// to [`UserRole::Guest`]. This is the only place raw role strings are
    /// interpreted.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => UserRole::Admin,
            "OPERATOR" => UserRole::Operator,
            _ => UserRole::Guest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A user account as reported by the auth backend.
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Sign-in email address.
    pub email: String,
    /// Normalized role.
    pub role: UserRole,
    /// Avatar image reference, if the account has one.
    pub avatar: Option<String>,
    /// Short profile text, if the account has one.
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// An authenticated session: identity plus bearer token.
pub struct Session {
    /// The signed-in user.
    pub user: User,
    /// Token to present on subsequent backend calls.
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Static display record for the project team page.
pub struct TeamMember {
    /// Unique identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Role description shown on the team page.
    pub role: String,
    /// Profile link.
    pub linkedin: String,
    /// Portrait image reference; the only mutable field.
    pub image_url: String,
    /// Whether the member is listed among the mentors.
    pub is_professor: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Read-only aggregate over the enabled bins; recomputed on every request.
pub struct DashboardStats {
    /// Number of enabled bins.
    pub total_bins: usize,
    /// Enabled bins currently at [`Status::Full`].
    pub full_bins: usize,
    /// Mean fill percentage across every compartment of every enabled bin,
    /// rounded to whole percent. 0 when there are no readings.
    pub avg_fill_percentage: u8,
    /// Enabled bins whose derived status is not [`Status::Normal`].
    pub active_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Change notification emitted by a bin store.
pub enum BinEvent {
    /// A new bin row appeared.
    Inserted(BinId),
    /// An existing bin row changed.
    Updated(BinId),
    /// A bin row was removed.
    Deleted(BinId),
    /// Events were dropped while the listener lagged; reload the view.
    Resync,
}
