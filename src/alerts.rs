//! Alert ledger: a bounded ring buffer of user-facing alerts with
//! read/unread state. The host decides when something deserves an alert;
//! the ledger only stores, lists and acknowledges them.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    /// Free-form context, e.g. path / status_code / error_type
    pub details: HashMap<String, serde_json::Value>,
    pub read: bool,
}

impl Alert {
    /// String detail, if present.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    pub fn detail_u64(&self, key: &str) -> Option<u64> {
        self.details.get(key).and_then(|v| v.as_u64())
    }
}

pub struct AlertLedger {
    inner: Mutex<LedgerInner>,
    capacity: usize,
}

struct LedgerInner {
    alerts: VecDeque<Alert>,
    counter: u64,
}

impl AlertLedger {
    pub fn new(capacity: usize) -> MonitorResult<Self> {
        if capacity == 0 {
            return Err(MonitorError::InvalidCapacity { what: "alert" });
        }
        Ok(Self {
            inner: Mutex::new(LedgerInner {
                alerts: VecDeque::with_capacity(capacity),
                counter: 0,
            }),
            capacity,
        })
    }

    /// Stores a new unread alert, evicting the oldest one when full.
    /// Returns the new alert's id.
    pub fn add(
        &self,
        kind: AlertKind,
        title: impl Into<String>,
        message: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) -> String {
        self.push(kind, title.into(), message.into(), details).id
    }

    /// Like [`add`](Self::add) but hands back a copy of the stored alert,
    /// for callers that forward it to a notifier.
    pub fn push(
        &self,
        kind: AlertKind,
        title: String,
        message: String,
        details: HashMap<String, serde_json::Value>,
    ) -> Alert {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        inner.counter += 1;

        // Counter suffix keeps ids unique within the same second
        let alert = Alert {
            id: format!("alert_{}_{}", now.timestamp(), inner.counter),
            timestamp: now,
            kind,
            title,
            message,
            details,
            read: false,
        };

        if inner.alerts.len() == self.capacity {
            if let Some(evicted) = inner.alerts.pop_front() {
                debug!(id = %evicted.id, "alert ledger full, evicting oldest");
            }
        }
        inner.alerts.push_back(alert.clone());
        alert
    }

    /// Newest first, optionally only unread ones, at most `limit`.
    pub fn list(&self, limit: usize, unread_only: bool) -> Vec<Alert> {
        let inner = self.inner.lock();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .iter()
            .rev()
            .filter(|a| !unread_only || !a.read)
            .cloned()
            .collect();
        // Already newest-first by insertion; the stable sort only matters if
        // the wall clock stepped backwards between two adds
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        alerts
    }

    /// `true` if the alert exists (whether or not it was already read).
    pub fn mark_read(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.read = true;
                true
            }
            None => false,
        }
    }

    /// Marks everything read; returns how many were unread before.
    pub fn mark_all_read(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut flipped = 0;
        for alert in inner.alerts.iter_mut().filter(|a| !a.read) {
            alert.read = true;
            flipped += 1;
        }
        flipped
    }

    pub fn unread_count(&self) -> usize {
        self.inner.lock().alerts.iter().filter(|a| !a.read).count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
