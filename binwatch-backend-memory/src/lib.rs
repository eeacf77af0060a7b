//! In-memory backend with fixture data.
//!
//! This is the store the console ran against before the hosted backend was
//! wired in; it survives as the demo backend and the integration-test
//! substrate. All collections live behind `RwLock`s and every mutation
//! emits the matching change event after the write commits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};

use binwatch_core::{
    backend::{Backend, BackendMeta},
    model::{Bin, BinEvent, BinId, Compartment, Session, Status, TeamMember, User, UserId, UserRole},
    ports::{AuthPort, BinStore, Credentials, StoreError, TeamStore},
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// In-memory bin collection.
pub struct MemoryBinStore {
    bins: RwLock<Vec<Bin>>,
    events: broadcast::Sender<BinEvent>,
}

impl MemoryBinStore {
    /// Create a store seeded with the given bins.
    #[must_use]
    pub fn new(initial: Vec<Bin>) -> Self {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            bins: RwLock::new(initial),
            events,
        }
    }

    fn emit(&self, event: BinEvent) {
        // A send error just means nobody is watching right now.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl BinStore for MemoryBinStore {
    async fn list(&self) -> Result<Vec<Bin>, StoreError> {
        let mut bins = self.bins.read().await.clone();
        bins.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(bins)
    }

    async fn list_for_operator(&self, operator: &UserId) -> Result<Vec<Bin>, StoreError> {
        let mut bins: Vec<Bin> = self
            .bins
            .read()
            .await
            .iter()
            .filter(|bin| bin.enabled && bin.assigned_operator_id.as_ref() == Some(operator))
            .cloned()
            .collect();
        bins.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(bins)
    }

    async fn get(&self, id: &BinId) -> Result<Bin, StoreError> {
        self.bins
            .read()
            .await
            .iter()
            .find(|bin| bin.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))
    }

    async fn insert(&self, bin: Bin) -> Result<Bin, StoreError> {
        let id = bin.id.clone();
        {
            let mut bins = self.bins.write().await;
            if bins.iter().any(|existing| existing.id == id) {
                return Err(StoreError::DuplicateId(id.0));
            }
            bins.push(bin.clone());
        }
        self.emit(BinEvent::Inserted(id));
        Ok(bin)
    }

    async fn update(&self, bin: Bin) -> Result<Bin, StoreError> {
        let id = bin.id.clone();
        {
            let mut bins = self.bins.write().await;
            let Some(slot) = bins.iter_mut().find(|existing| existing.id == id) else {
                return Err(StoreError::NotFound(id.0));
            };
            *slot = bin.clone();
        }
        self.emit(BinEvent::Updated(id));
        Ok(bin)
    }

    fn changes(&self) -> broadcast::Receiver<BinEvent> {
        self.events.subscribe()
    }
}

/// In-memory team roster.
pub struct MemoryTeamStore {
    members: RwLock<Vec<TeamMember>>,
}

impl MemoryTeamStore {
    /// Create a store seeded with the given roster.
    #[must_use]
    pub fn new(initial: Vec<TeamMember>) -> Self {
        Self {
            members: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl TeamStore for MemoryTeamStore {
    async fn team(&self) -> Result<Vec<TeamMember>, StoreError> {
        Ok(self.members.read().await.clone())
    }

    async fn update_image(&self, id: u32, image_url: &str) -> Result<TeamMember, StoreError> {
        let mut members = self.members.write().await;
        let Some(member) = members.iter_mut().find(|member| member.id == id) else {
            return Err(StoreError::NotFound(format!("team member {id}")));
        };
        member.image_url = image_url.to_owned();
        Ok(member.clone())
    }
}

struct FixtureAccount {
    user: User,
    password: &'static str,
}

/// Fixture email/password authentication.
pub struct MemoryAuth {
    accounts: Vec<FixtureAccount>,
    token_counter: AtomicU64,
}

impl MemoryAuth {
    fn with_fixture_accounts() -> Self {
        Self {
            accounts: fixture_accounts(),
            token_counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AuthPort for MemoryAuth {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError> {
        let email = credentials.email.trim().to_ascii_lowercase();
        let account = self
            .accounts
            .iter()
            .find(|account| {
                account.user.email.eq_ignore_ascii_case(&email)
                    && account.password == credentials.password
            })
            .ok_or(StoreError::Unauthorized)?;

        let serial = self.token_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Session {
            user: account.user.clone(),
            access_token: format!("token-{}-{serial}", account.user.id),
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Assemble the fixture backend bundle.
///
/// Sign-in accounts: `admin@binwatch.example` / `admin`,
/// `operator1@binwatch.example` / `operator1`,
/// `operator2@binwatch.example` / `operator2`, and
/// `guest@binwatch.example` / `guest` (no console).
#[must_use]
pub fn backend() -> Backend {
    backend_with_bins(fixture_bins())
}

/// Assemble a memory backend seeded with the given bins.
#[must_use]
pub fn backend_with_bins(bins: Vec<Bin>) -> Backend {
    Backend {
        meta: BackendMeta {
            id: String::from("memory"),
            name: String::from("In-memory fixtures"),
        },
        bins: Arc::new(MemoryBinStore::new(bins)),
        team: Arc::new(MemoryTeamStore::new(fixture_team())),
        auth: Arc::new(MemoryAuth::with_fixture_accounts()),
    }
}

fn ts(iso: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(iso)
        .expect("fixture timestamp must parse")
        .with_timezone(&Utc)
}

fn compartments(organic: u8, plastic: u8, metal: u8) -> Vec<Compartment> {
    vec![
        Compartment {
            id: String::from("c1"),
            name: String::from("Organic"),
            fill_level: organic,
        },
        Compartment {
            id: String::from("c2"),
            name: String::from("Plastic"),
            fill_level: plastic,
        },
        Compartment {
            id: String::from("c3"),
            name: String::from("Metal"),
            fill_level: metal,
        },
    ]
}

#[expect(clippy::too_many_arguments, reason = "flat fixture constructor")]
fn fixture_bin(
    id: &str,
    location_name: &str,
    address: &str,
    latitude: f64,
    longitude: f64,
    enabled: bool,
    last_emptied: &str,
    operator: Option<&str>,
    fills: (u8, u8, u8),
) -> Bin {
    let compartments = compartments(fills.0, fills.1, fills.2);
    Bin {
        id: BinId(id.to_owned()),
        location_name: location_name.to_owned(),
        address: address.to_owned(),
        latitude,
        longitude,
        status: Status::derive(&compartments),
        enabled,
        last_emptied: ts(last_emptied),
        assigned_operator_id: operator.map(|op| UserId(op.to_owned())),
        local_body_email: String::from("ward-office@city.example"),
        compartments,
    }
}

/// Seed bins spanning all three status bands, two operators, and one
/// disabled unit.
#[must_use]
pub fn fixture_bins() -> Vec<Bin> {
    vec![
        fixture_bin(
            "BIN-001",
            "Riverside Park",
            "2 Promenade Walk",
            48.1374,
            11.5755,
            true,
            "2024-03-25T10:00:00Z",
            Some("op-1"),
            (45, 30, 10),
        ),
        fixture_bin(
            "BIN-002",
            "Central Station",
            "1 Bahnhofplatz",
            48.1402,
            11.5580,
            true,
            "2024-03-24T08:00:00Z",
            Some("op-1"),
            (95, 92, 88),
        ),
        fixture_bin(
            "BIN-003",
            "Market Square",
            "14 Viktualienmarkt",
            48.1351,
            11.5762,
            true,
            "2024-03-26T14:30:00Z",
            Some("op-2"),
            (20, 15, 5),
        ),
        fixture_bin(
            "BIN-004",
            "Harbor Promenade",
            "7 Kaistrasse",
            48.1420,
            11.5610,
            false,
            "2024-03-27T09:15:00Z",
            Some("op-1"),
            (98, 94, 91),
        ),
        fixture_bin(
            "BIN-005",
            "City Library",
            "90 Rosenheimer Strasse",
            48.1310,
            11.6020,
            true,
            "2024-03-27T11:45:00Z",
            Some("op-2"),
            (92, 96, 89),
        ),
        fixture_bin(
            "BIN-006",
            "Botanic Garden",
            "65 Menzinger Strasse",
            48.1650,
            11.5010,
            true,
            "2024-03-26T15:00:00Z",
            Some("op-2"),
            (75, 82, 40),
        ),
    ]
}

/// Seed roster for the team settings screen.
#[must_use]
pub fn fixture_team() -> Vec<TeamMember> {
    let member = |id: u32, name: &str, role: &str, is_professor: bool| TeamMember {
        id,
        name: name.to_owned(),
        role: role.to_owned(),
        linkedin: format!("https://www.linkedin.com/in/binwatch-{id}/"),
        image_url: format!("https://i.pravatar.cc/300?u={id}"),
        is_professor,
    };

    vec![
        member(1, "Lena Hartmann", "Frontend", false),
        member(2, "Ravi Deshmukh", "Backend", false),
        member(3, "Mara Fuchs", "Sensor Hardware", false),
        member(4, "Jonas Weigel", "Embedded Firmware", false),
        member(101, "Dr. Anne Brandt", "Project Mentor", true),
    ]
}

fn fixture_accounts() -> Vec<FixtureAccount> {
    let account = |id: &str, name: &str, email: &str, role: UserRole, bio: &str, password| {
        FixtureAccount {
            user: User {
                id: UserId(id.to_owned()),
                name: name.to_owned(),
                email: email.to_owned(),
                role,
                avatar: Some(format!("https://i.pravatar.cc/150?u={id}")),
                bio: Some(bio.to_owned()),
            },
            password,
        }
    };

    vec![
        account(
            "admin-1",
            "Admin Control",
            "admin@binwatch.example",
            UserRole::Admin,
            "Regional waste logistics manager",
            "admin",
        ),
        account(
            "op-1",
            "Operator 1",
            "operator1@binwatch.example",
            UserRole::Operator,
            "Field specialist, zone 4",
            "operator1",
        ),
        account(
            "op-2",
            "Operator 2",
            "operator2@binwatch.example",
            UserRole::Operator,
            "Field specialist, zone 2",
            "operator2",
        ),
        account(
            "guest-1",
            "Guest",
            "guest@binwatch.example",
            UserRole::Guest,
            "Visitor account",
            "guest",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use binwatch_core::model::{BinEvent, BinId, UserId};
    use binwatch_core::ports::{AuthPort, BinStore, Credentials, StoreError, TeamStore};

    use super::{MemoryAuth, MemoryBinStore, MemoryTeamStore, fixture_bins, fixture_team};

    #[tokio::test]
    async fn list_orders_by_ascending_id() {
        let mut shuffled = fixture_bins();
        shuffled.reverse();
        let store = MemoryBinStore::new(shuffled);

        let bins = store.list().await.unwrap();
        let ids: Vec<&str> = bins.iter().map(|bin| bin.id.0.as_str()).collect();
        assert_eq!(
            ids,
            vec!["BIN-001", "BIN-002", "BIN-003", "BIN-004", "BIN-005", "BIN-006"]
        );
    }

    #[tokio::test]
    async fn operator_listing_skips_disabled_bins() {
        let store = MemoryBinStore::new(fixture_bins());

        // BIN-004 is assigned to op-1 but disabled.
        let bins = store
            .list_for_operator(&UserId(String::from("op-1")))
            .await
            .unwrap();
        let ids: Vec<&str> = bins.iter().map(|bin| bin.id.0.as_str()).collect();
        assert_eq!(ids, vec!["BIN-001", "BIN-002"]);
        assert!(bins.iter().all(|bin| bin.enabled));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids_without_side_effects() {
        let store = MemoryBinStore::new(fixture_bins());
        let existing = store.get(&BinId(String::from("BIN-001"))).await.unwrap();

        let err = store.insert(existing).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "BIN-001"));
        assert_eq!(store.list().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn mutations_emit_change_events_after_commit() {
        let store = MemoryBinStore::new(fixture_bins());
        let mut changes = store.changes();

        let mut bin = store.get(&BinId(String::from("BIN-003"))).await.unwrap();
        bin.compartments[0].fill_level = 77;
        store.update(bin).await.unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            BinEvent::Updated(BinId(String::from("BIN-003")))
        );
    }

    #[tokio::test]
    async fn team_image_update_replaces_only_the_portrait() {
        let store = MemoryTeamStore::new(fixture_team());

        let updated = store.update_image(2, "https://cdn.example/ravi.png").await.unwrap();
        assert_eq!(updated.image_url, "https://cdn.example/ravi.png");
        assert_eq!(updated.name, "Ravi Deshmukh");

        let err = store.update_image(999, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn sign_in_checks_email_and_password() {
        let auth = MemoryAuth::with_fixture_accounts();

        let session = auth
            .sign_in(&Credentials::new("admin@binwatch.example", "admin"))
            .await
            .unwrap();
        assert_eq!(session.user.id.0, "admin-1");
        assert!(session.access_token.starts_with("token-admin-1-"));

        let err = auth
            .sign_in(&Credentials::new("admin@binwatch.example", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
    }
}
