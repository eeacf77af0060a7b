//! High-level service facade used by console code.

use std::sync::Arc;

use chrono::Utc;

use crate::backend::Backend;
use crate::model::{
    Bin, BinEvent, BinId, Compartment, DashboardStats, NewBin, Session, Status, TeamMember, UserId,
};
use crate::ports::{Credentials, StoreError};
use crate::subscription::ChangeListener;

/// Compartment layout every freshly registered bin starts with.
fn default_compartments() -> Vec<Compartment> {
    ["Organic", "Plastic", "Metal"]
        .iter()
        .enumerate()
        .map(|(index, name)| Compartment {
            id: format!("c{}", index + 1),
            name: (*name).to_owned(),
            fill_level: 0,
        })
        .collect()
}

/// Single point through which console code reads and mutates bin, stats,
/// and team data, abstracting over whichever backend is configured.
///
/// All reads re-derive each bin's status from its compartments; the stored
/// status column is treated as a cache that nothing enforces transactionally.
pub struct BinService {
    backend: Arc<Backend>,
}

impl BinService {
    /// Create a new service bound to the provided backend bundle.
    #[must_use]
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Human-friendly name of the configured backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.backend.meta.name
    }

    /// Return every bin, ascending by id, with freshly derived status.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    pub async fn list_bins(&self) -> Result<Vec<Bin>, StoreError> {
        let mut bins = self.backend.bins.list().await?;
        for bin in &mut bins {
            bin.refresh_status();
        }
        // Callers rely on ascending id regardless of backend ordering.
        bins.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        tracing::debug!(count = bins.len(), "listed bins");
        Ok(bins)
    }

    /// Return the enabled bins assigned to `operator`, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    pub async fn operator_bins(&self, operator: &UserId) -> Result<Vec<Bin>, StoreError> {
        let mut bins = self.backend.bins.list_for_operator(operator).await?;
        // The store already filters; the facade still holds the contract
        // that a disabled bin never reaches an operator view.
        bins.retain(|bin| bin.enabled);
        for bin in &mut bins {
            bin.refresh_status();
        }
        bins.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(bins)
    }

    /// Compute the dashboard aggregate over the enabled bins.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    pub async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let bins = self.backend.bins.list().await?;

        let mut stats = DashboardStats::default();
        let mut fill_sum: u64 = 0;
        let mut readings: u64 = 0;

        for bin in bins.iter().filter(|bin| bin.enabled) {
            stats.total_bins += 1;
            match Status::derive(&bin.compartments) {
                Status::Full => {
                    stats.full_bins += 1;
                    stats.active_alerts += 1;
                }
                Status::Warning => stats.active_alerts += 1,
                Status::Normal => {}
            }
            for compartment in &bin.compartments {
                fill_sum += u64::from(compartment.fill_level);
                readings += 1;
            }
        }

        // Round-half-up integer mean; levels are 0..=100 so this fits u8.
        stats.avg_fill_percentage = if readings == 0 {
            0
        } else {
            u8::try_from((fill_sum + readings / 2) / readings).unwrap_or(u8::MAX)
        };

        Ok(stats)
    }

    /// Empty a bin: zero every compartment, reset status, stamp the time.
    ///
    /// Idempotent apart from `last_emptied` advancing. Two operators
    /// emptying the same bin race last-write-wins at the store; both
    /// writers converge on zero fills.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent, or another
    /// [`StoreError`] when the write fails.
    pub async fn empty_bin(&self, id: &BinId) -> Result<Bin, StoreError> {
        let mut bin = self.backend.bins.get(id).await?;
        for compartment in &mut bin.compartments {
            compartment.fill_level = 0;
        }
        bin.status = Status::Normal;
        bin.last_emptied = Utc::now();

        let mut updated = self.backend.bins.update(bin).await?;
        updated.refresh_status();
        tracing::info!(bin = %id, "bin marked as emptied");
        Ok(updated)
    }

    /// Register a new bin with the default compartment layout.
    ///
    /// Validation happens before anything is persisted; a rejected input
    /// leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] naming the violated fields,
    /// [`StoreError::DuplicateId`] when the id is taken, or another
    /// [`StoreError`] when the write fails.
    pub async fn add_bin(&self, input: NewBin) -> Result<Bin, StoreError> {
        input
            .validate()
            .map_err(|fields| StoreError::Validation { fields })?;

        let bin = Bin {
            id: BinId(input.id.trim().to_owned()),
            location_name: input.location_name.trim().to_owned(),
            address: input.address.trim().to_owned(),
            latitude: input.latitude,
            longitude: input.longitude,
            status: Status::Normal,
            enabled: true,
            last_emptied: Utc::now(),
            assigned_operator_id: input.assigned_operator_id,
            local_body_email: input.local_body_email.trim().to_owned(),
            compartments: default_compartments(),
        };

        let mut stored = self.backend.bins.insert(bin).await?;
        stored.refresh_status();
        tracing::info!(bin = %stored.id, "bin registered");
        Ok(stored)
    }

    /// Start watching the bin collection for changes.
    ///
    /// `callback` runs once per change notification (at least once per
    /// change; a lagged listener receives [`BinEvent::Resync`] instead).
    /// Dropping the returned handle releases the subscription.
    #[must_use]
    pub fn watch_bins<F>(&self, callback: F) -> ChangeListener
    where
        F: FnMut(BinEvent) + Send + 'static,
    {
        ChangeListener::spawn(self.backend.bins.changes(), callback)
    }

    /// Return the team roster.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the underlying query fails.
    pub async fn team(&self) -> Result<Vec<TeamMember>, StoreError> {
        self.backend.team.team().await
    }

    /// Replace the stored portrait reference for one team member.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such member exists, or
    /// another [`StoreError`] when the write fails.
    pub async fn update_team_image(
        &self,
        id: u32,
        image_url: &str,
    ) -> Result<TeamMember, StoreError> {
        self.backend.team.update_image(id, image_url).await
    }

    /// Sign in against the configured auth backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unauthorized`] when the credentials are
    /// rejected, or another [`StoreError`] when the request fails.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError> {
        let session = self.backend.auth.sign_in(credentials).await?;
        tracing::info!(
            user = %session.user.id,
            role = ?session.user.role,
            "signed in"
        );
        Ok(session)
    }

    /// Invalidate a session token.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the request fails.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        self.backend.auth.sign_out(access_token).await
    }
}
