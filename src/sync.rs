use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use crate::api::client::DirectoryApi;
use crate::api::models::SubscriptionRecord;
use crate::error::SyncError;
use crate::link;
use crate::profile::ProfileImporter;

/// Group tag applied to every profile imported from the backend.
pub const DEFAULT_GROUP: &str = "guardx_mobile";

/// Outcome of one sync batch. `imported == 0` with no error means the
/// backend answered but every record failed to import, which callers
/// present differently from a fetch failure (`Err`).
#[derive(Debug, Default)]
pub struct SyncReport {
    pub imported: usize,
    pub failed: usize,
    pub failures: Vec<(String, SyncError)>,
}

/// Ties the directory client and the profile importer together: fetch the
/// server list, derive each record's share link, import sequentially.
pub struct SyncManager<C, I> {
    client: C,
    importer: I,
    group: String,
    in_flight: AtomicBool,
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<C, I> SyncManager<C, I>
where
    C: DirectoryApi + Sync,
    I: ProfileImporter + Sync,
{
    pub fn new(client: C, importer: I, group: impl Into<String>) -> Self {
        Self {
            client,
            importer,
            group: group.into(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Fetch the server list and import every record under the manager's
    /// group tag.
    ///
    /// Any fetch-level failure (auth, network, empty or malformed response)
    /// aborts before the per-record stage. Per-record failures are logged
    /// and tallied but never abort the batch. Imports run sequentially so
    /// the resulting profile order matches the backend's and every failure
    /// attributes to exactly one record. Overlapping calls are rejected
    /// with [`SyncError::SyncInFlight`].
    pub async fn sync_servers(&self, token: &str) -> Result<SyncReport, SyncError> {
        let _guard = self.begin()?;

        debug!("syncing servers from backend");
        let servers = self.client.fetch_servers(token).await?;

        let mut report = SyncReport::default();
        for server in &servers {
            let result = link::share_link(server)
                .and_then(|link| self.importer.import(&link, &self.group));
            match result {
                Ok(tag) => {
                    debug!("imported {} as {tag}", server.name);
                    report.imported += 1;
                }
                Err(error) => {
                    warn!("failed to import {}: {error}", server.name);
                    report.failed += 1;
                    report.failures.push((server.name.clone(), error));
                }
            }
        }

        debug!(
            "sync finished: {} imported, {} failed",
            report.imported, report.failed
        );
        Ok(report)
    }

    /// Current plan state, or `None` when the user has no active plan.
    pub async fn fetch_subscription_summary(
        &self,
        token: &str,
    ) -> Result<Option<SubscriptionRecord>, SyncError> {
        self.client.fetch_subscription(token).await
    }

    fn begin(&self) -> Result<FlightGuard<'_>, SyncError> {
        match self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(FlightGuard(&self.in_flight)),
            Err(_) => Err(SyncError::SyncInFlight),
        }
    }
}
