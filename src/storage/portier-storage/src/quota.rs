//! Daily email quota.
//!
//! Each send increments a per-project counter keyed by UTC day. A send is
//! refused once the counter passes the project's override, or the
//! configured default when the project has none.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::StorageError;
use crate::store::IdentityStore;

const SECONDS_PER_DAY: i64 = 86_400;

/// Quota policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailQuotaConfig {
    /// Emails per project per day when the project sets no override.
    pub default_daily: u32,
}

impl Default for EmailQuotaConfig {
    fn default() -> Self {
        Self { default_daily: 1000 }
    }
}

/// Result of an accepted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Emails counted today, this one included.
    pub usage: u32,
    /// Effective quota for the project.
    pub quota: u32,
}

/// Enforces [`EmailQuotaConfig`] against an [`IdentityStore`].
#[derive(Clone)]
pub struct DailyEmailQuota {
    store: Arc<dyn IdentityStore>,
    config: EmailQuotaConfig,
}

impl DailyEmailQuota {
    /// Creates the policy.
    pub fn new(store: Arc<dyn IdentityStore>, config: EmailQuotaConfig) -> Self {
        Self { store, config }
    }

    /// Counts one email for `project_id` on the UTC day containing `now`.
    ///
    /// The increment is kept even when the send is refused.
    pub async fn record_send(&self, project_id: Uuid, now: i64) -> Result<QuotaUsage, StorageError> {
        let project = self.store.get_project(project_id).await?;
        let usage = self
            .store
            .increment_email_daily_quota_usage(project_id, now.div_euclid(SECONDS_PER_DAY))
            .await?;
        let quota = project.email_quota_daily.unwrap_or(self.config.default_daily);

        info!(project_id = %project_id, usage, quota, "email_daily_quota_usage");

        if usage > quota {
            info!(project_id = %project_id, "email_daily_quota_exceeded");
            return Err(StorageError::QuotaExceeded { usage, quota });
        }

        Ok(QuotaUsage { usage, quota })
    }
}
