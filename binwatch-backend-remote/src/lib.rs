//! Backend implementation against a hosted record store.
//!
//! Rows live under `{base}/rest/v1/{table}` with exact-match `col=eq.val`
//! filters and `order=` sorting; auth is the hosted token-password exchange
//! under `{base}/auth/v1`. The store pushes no changes to HTTP clients, so
//! the change feed is a background poll that diffs row snapshots and emits
//! events on a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use binwatch_core::{
    backend::{Backend, BackendMeta},
    model::{Bin, BinEvent, BinId, Compartment, Session, Status, TeamMember, User, UserId, UserRole},
    ports::{AuthPort, BinStore, Credentials, StoreError, TeamStore},
};

const REST_PATH: &str = "rest/v1";
const AUTH_PATH: &str = "auth/v1";
const BINS_TABLE: &str = "bins";
const TEAM_TABLE: &str = "team_members";

/// Idempotent reads get a bounded retry; writes are never retried.
const READ_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

const CHANGE_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// Connection settings for the hosted backend.
pub struct RemoteOptions {
    /// Base URL of the hosted project, without a trailing slash.
    pub base_url: String,
    /// Project API key sent as `apikey` and bearer token.
    pub api_key: String,
    /// How often the change feed polls the bin table.
    pub poll_interval: Duration,
}

impl RemoteOptions {
    /// Construct options with the default poll interval.
    #[must_use]
    pub fn new<B: Into<String>, K: Into<String>>(base_url: B, api_key: K) -> Self {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_owned();
        Self {
            base_url,
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the change-feed poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Shared request plumbing for all remote ports.
#[derive(Clone)]
struct Api {
    http: Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
}

impl Api {
    fn new(http: Client, options: &RemoteOptions) -> Self {
        Self {
            http,
            base_url: Arc::from(options.base_url.as_str()),
            api_key: Arc::from(options.api_key.as_str()),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, table)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, AUTH_PATH, endpoint)
    }

    fn with_keys(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref())
    }

    /// Select rows with a bounded retry for transient failures.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<T, StoreError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            let req = self.with_keys(self.http.get(self.table_url(table)).query(query));
            match fetch_json::<T>(req).await {
                Ok(rows) => return Ok(rows),
                Err(err) if attempt < READ_ATTEMPTS && is_transient(&err) => {
                    tracing::warn!(table, attempt, error = %err, "select failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Network(inner) => {
            inner.status().is_none_or(|status| status.is_server_error())
        }
        _ => false,
    }
}

/// Fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, StoreError> {
    let value = req
        .send()
        .await
        .map_err(StoreError::from)?
        .error_for_status()
        .map_err(StoreError::from)?
        .json()
        .await
        .map_err(StoreError::from)?;
    Ok(value)
}

/// Compartment readings as stored in the row's JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompartmentRow {
    id: String,
    name: String,
    fill_level: i64,
}

/// Bin row shape; `id` is the canonical key column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinRow {
    id: String,
    location_name: String,
    address: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    status: Option<String>,
    enabled: bool,
    last_emptied: DateTime<Utc>,
    #[serde(default)]
    assigned_operator_id: Option<String>,
    local_body_email: String,
    compartments: Vec<CompartmentRow>,
}

impl BinRow {
    /// Normalize a raw row into the domain type. This is the single place
    /// where fill levels are clamped and the status column is interpreted.
    fn into_bin(self) -> Bin {
        let compartments: Vec<Compartment> = self
            .compartments
            .into_iter()
            .map(|row| Compartment {
                id: row.id,
                name: row.name,
                fill_level: u8::try_from(row.fill_level.clamp(0, 100)).unwrap_or(100),
            })
            .collect();

        let status = match self.status.as_deref() {
            Some("FULL") => Status::Full,
            Some("WARNING") => Status::Warning,
            Some("NORMAL") => Status::Normal,
            // Unknown or missing column value: fall back to the readings.
            _ => Status::derive(&compartments),
        };

        Bin {
            id: BinId(self.id),
            location_name: self.location_name,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            status,
            enabled: self.enabled,
            last_emptied: self.last_emptied,
            assigned_operator_id: self.assigned_operator_id.map(UserId),
            local_body_email: self.local_body_email,
            compartments,
        }
    }

    fn from_bin(bin: &Bin) -> Self {
        Self {
            id: bin.id.0.clone(),
            location_name: bin.location_name.clone(),
            address: bin.address.clone(),
            latitude: bin.latitude,
            longitude: bin.longitude,
            status: Some(bin.status.to_string()),
            enabled: bin.enabled,
            last_emptied: bin.last_emptied,
            assigned_operator_id: bin
                .assigned_operator_id
                .as_ref()
                .map(|operator| operator.0.clone()),
            local_body_email: bin.local_body_email.clone(),
            compartments: bin
                .compartments
                .iter()
                .map(|compartment| CompartmentRow {
                    id: compartment.id.clone(),
                    name: compartment.name.clone(),
                    fill_level: i64::from(compartment.fill_level),
                })
                .collect(),
        }
    }
}

/// Bin collection backed by the hosted record store.
pub struct RemoteBinStore {
    api: Api,
    events: broadcast::Sender<BinEvent>,
    poller: JoinHandle<()>,
}

impl RemoteBinStore {
    /// Create the store and start its change-feed poller.
    #[must_use]
    pub fn new(http: Client, options: &RemoteOptions) -> Self {
        let api = Api::new(http, options);
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let poller = tokio::spawn(poll_changes(
            api.clone(),
            events.clone(),
            options.poll_interval,
        ));
        Self {
            api,
            events,
            poller,
        }
    }
}

impl Drop for RemoteBinStore {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[async_trait]
impl BinStore for RemoteBinStore {
    async fn list(&self) -> Result<Vec<Bin>, StoreError> {
        let rows: Vec<BinRow> = self
            .api
            .select(
                BINS_TABLE,
                &[
                    ("select", String::from("*")),
                    ("order", String::from("id.asc")),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(BinRow::into_bin).collect())
    }

    async fn list_for_operator(&self, operator: &UserId) -> Result<Vec<Bin>, StoreError> {
        let rows: Vec<BinRow> = self
            .api
            .select(
                BINS_TABLE,
                &[
                    ("select", String::from("*")),
                    ("assigned_operator_id", format!("eq.{operator}")),
                    ("enabled", String::from("eq.true")),
                    ("order", String::from("id.asc")),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(BinRow::into_bin).collect())
    }

    async fn get(&self, id: &BinId) -> Result<Bin, StoreError> {
        let rows: Vec<BinRow> = self
            .api
            .select(
                BINS_TABLE,
                &[
                    ("select", String::from("*")),
                    ("id", format!("eq.{id}")),
                ],
            )
            .await?;
        rows.into_iter()
            .next()
            .map(BinRow::into_bin)
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))
    }

    async fn insert(&self, bin: Bin) -> Result<Bin, StoreError> {
        let row = BinRow::from_bin(&bin);
        let response = self
            .api
            .with_keys(self.api.http.post(self.api.table_url(BINS_TABLE)))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::DuplicateId(bin.id.0));
        }
        let rows: Vec<BinRow> = response.error_for_status()?.json().await?;
        rows.into_iter()
            .next()
            .map(BinRow::into_bin)
            .ok_or_else(|| StoreError::Backend(String::from("insert returned no representation")))
    }

    async fn update(&self, bin: Bin) -> Result<Bin, StoreError> {
        let row = BinRow::from_bin(&bin);
        let response = self
            .api
            .with_keys(
                self.api
                    .http
                    .patch(self.api.table_url(BINS_TABLE))
                    .query(&[("id", format!("eq.{}", bin.id))]),
            )
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let rows: Vec<BinRow> = response.error_for_status()?.json().await?;
        rows.into_iter()
            .next()
            .map(BinRow::into_bin)
            .ok_or_else(|| StoreError::NotFound(bin.id.0))
    }

    fn changes(&self) -> broadcast::Receiver<BinEvent> {
        self.events.subscribe()
    }
}

/// Poll the bin table and translate snapshot diffs into change events.
async fn poll_changes(api: Api, events: broadcast::Sender<BinEvent>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut known: Option<HashMap<String, BinRow>> = None;

    loop {
        ticker.tick().await;

        let req = api.with_keys(
            api.http
                .get(api.table_url(BINS_TABLE))
                .query(&[("select", "*")]),
        );
        let rows: Vec<BinRow> = match fetch_json(req).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "change-feed poll failed");
                continue;
            }
        };

        let snapshot: HashMap<String, BinRow> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();

        if let Some(previous) = &known {
            for (id, row) in &snapshot {
                match previous.get(id) {
                    None => {
                        let _ = events.send(BinEvent::Inserted(BinId(id.clone())));
                    }
                    Some(old) if old != row => {
                        let _ = events.send(BinEvent::Updated(BinId(id.clone())));
                    }
                    Some(_) => {}
                }
            }
            for id in previous.keys() {
                if !snapshot.contains_key(id) {
                    let _ = events.send(BinEvent::Deleted(BinId(id.clone())));
                }
            }
        }

        known = Some(snapshot);
    }
}

/// Team roster row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TeamRow {
    id: u32,
    name: String,
    role: String,
    linkedin: String,
    image_url: String,
    #[serde(default)]
    is_professor: bool,
}

impl TeamRow {
    fn into_member(self) -> TeamMember {
        TeamMember {
            id: self.id,
            name: self.name,
            role: self.role,
            linkedin: self.linkedin,
            image_url: self.image_url,
            is_professor: self.is_professor,
        }
    }
}

/// Team roster backed by the hosted record store.
pub struct RemoteTeamStore {
    api: Api,
}

impl RemoteTeamStore {
    /// Create a new roster store.
    #[must_use]
    pub fn new(http: Client, options: &RemoteOptions) -> Self {
        Self {
            api: Api::new(http, options),
        }
    }
}

#[async_trait]
impl TeamStore for RemoteTeamStore {
    async fn team(&self) -> Result<Vec<TeamMember>, StoreError> {
        let rows: Vec<TeamRow> = self
            .api
            .select(
                TEAM_TABLE,
                &[
                    ("select", String::from("*")),
                    ("order", String::from("id.asc")),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(TeamRow::into_member).collect())
    }

    async fn update_image(&self, id: u32, image_url: &str) -> Result<TeamMember, StoreError> {
        #[derive(Serialize)]
        struct ImagePatch<'url> {
            image_url: &'url str,
        }

        let response = self
            .api
            .with_keys(
                self.api
                    .http
                    .patch(self.api.table_url(TEAM_TABLE))
                    .query(&[("id", format!("eq.{id}"))]),
            )
            .header("Prefer", "return=representation")
            .json(&ImagePatch { image_url })
            .send()
            .await?;

        let rows: Vec<TeamRow> = response.error_for_status()?.json().await?;
        rows.into_iter()
            .next()
            .map(TeamRow::into_member)
            .ok_or_else(|| StoreError::NotFound(format!("team member {id}")))
    }
}

/// Raw sign-in response from the auth service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUserRow,
}

/// Raw user payload from the auth service.
#[derive(Debug, Deserialize)]
struct AuthUserRow {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_metadata: AuthUserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AuthUserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl AuthUserRow {
    fn into_user(self) -> User {
        let email = self.email.unwrap_or_default();
        let name = self
            .user_metadata
            .name
            .clone()
            .or_else(|| email.split('@').next().map(str::to_owned))
            .unwrap_or_else(|| self.id.clone());
        User {
            id: UserId(self.id),
            name,
            email,
            role: UserRole::from_raw(self.role.as_deref().unwrap_or_default()),
            avatar: self.user_metadata.avatar_url,
            bio: self.user_metadata.bio,
        }
    }
}

/// Email/password authentication against the hosted auth service.
pub struct RemoteAuth {
    api: Api,
}

impl RemoteAuth {
    /// Create a new auth port.
    #[must_use]
    pub fn new(http: Client, options: &RemoteOptions) -> Self {
        Self {
            api: Api::new(http, options),
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'cred> {
    email: &'cred str,
    password: &'cred str,
}

#[async_trait]
impl AuthPort for RemoteAuth {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError> {
        let response = self
            .api
            .with_keys(
                self.api
                    .http
                    .post(self.api.auth_url("token"))
                    .query(&[("grant_type", "password")]),
            )
            .json(&PasswordGrant {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            return Err(StoreError::Unauthorized);
        }

        let token: TokenResponse = response.error_for_status()?.json().await?;
        Ok(Session {
            user: token.user.into_user(),
            access_token: token.access_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        self.api
            .http
            .post(self.api.auth_url("logout"))
            .header("apikey", self.api.api_key.as_ref())
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Assemble the remote backend bundle.
#[must_use]
pub fn backend(http: Client, options: &RemoteOptions) -> Backend {
    Backend {
        meta: BackendMeta {
            id: String::from("remote"),
            name: String::from("Hosted record store"),
        },
        bins: Arc::new(RemoteBinStore::new(http.clone(), options)),
        team: Arc::new(RemoteTeamStore::new(http.clone(), options)),
        auth: Arc::new(RemoteAuth::new(http, options)),
    }
}
