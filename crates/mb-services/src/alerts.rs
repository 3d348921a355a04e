//! # Announcement Feed
//!
//! Reads every alert once per page load. Independent of the submission
//! pipeline and fail-soft: any error yields an empty snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mb_core::{Alert, RelationalStore};

/// Alerts as fetched at one point in time. Never refreshed in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSnapshot {
    alerts: Vec<Alert>,
    fetched_at: DateTime<Utc>,
}

impl AlertSnapshot {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            fetched_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl IntoIterator for AlertSnapshot {
    type Item = Alert;
    type IntoIter = std::vec::IntoIter<Alert>;

    fn into_iter(self) -> Self::IntoIter {
        self.alerts.into_iter()
    }
}

pub struct AnnouncementFeed {
    store: Arc<dyn RelationalStore>,
    table: String,
}

impl AnnouncementFeed {
    pub fn new(store: Arc<dyn RelationalStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// All alerts, unfiltered and in store order.
    pub async fn fetch_all(&self) -> AlertSnapshot {
        let rows = match self.store.select_all(&self.table).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "error fetching alerts");
                return AlertSnapshot::empty();
            }
        };

        match rows
            .into_iter()
            .map(serde_json::from_value::<Alert>)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(alerts) => AlertSnapshot::new(alerts),
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "malformed alert row");
                AlertSnapshot::empty()
            }
        }
    }
}
