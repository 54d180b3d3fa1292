//! Cross-process job-status tracking for report windows.
//!
//! Third-party report jobs run for minutes and are polled by whichever worker
//! picks them up, so in-flight state must live in the shared store. Each
//! channel owns one set, `active-report:<channel>`, whose members are
//! canonically serialized [`WindowEntry`] values.
//!
//! An entry's identity is `(ad_account_id, since, until)` within its
//! channel's set; status and task id are payload. Reporting a status replaces
//! the identity's previous entry, and scheduling skips identities that are
//! already in flight. Every write refreshes a TTL on the whole set so a
//! crashed worker can never leave a window stuck forever.

use crate::canonical::to_canonical_json;
use crate::channel::Channel;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::reporting::DateRange;
use crate::store::KeyValueStore;
use chrono::{NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle of a report window.
///
/// Windows are created as `Queuing`; the polling worker reports every later
/// transition. Terminal entries linger until TTL eviction for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queuing,
    Processing,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queuing => "QUEUING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Window Entry
// ═══════════════════════════════════════════════════════════════════════════════

/// A report window's state as stored in its channel set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub ad_account_id: String,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl WindowEntry {
    fn queuing(ad_account_id: &str, range: DateRange) -> Self {
        Self {
            ad_account_id: ad_account_id.to_string(),
            since: range.since,
            until: range.until,
            status: JobStatus::Queuing,
            task_id: None,
        }
    }

    /// Whether this entry tracks the given account and window.
    pub fn matches(&self, ad_account_id: &str, range: &DateRange) -> bool {
        self.ad_account_id == ad_account_id && self.since == range.since && self.until == range.until
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            since: self.since,
            until: self.until,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status Tracker
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracks which report windows are in flight per channel.
pub struct JobStatusTracker {
    store: Arc<dyn KeyValueStore>,
    config: TrackerConfig,
}

impl JobStatusTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    /// Register the report windows a sync of the given accounts needs.
    ///
    /// The lookback (full history for an initial sync, a short catch-up
    /// otherwise) ends yesterday and is split to the channel's maximum report
    /// period. Each resulting window becomes one `Queuing` entry; windows
    /// whose identity is already in flight are skipped.
    ///
    /// Returns the windows actually registered, per account.
    #[instrument(skip(self, ad_accounts), fields(channel = %channel, accounts = ad_accounts.len()))]
    pub async fn schedule_windows(
        &self,
        channel: Channel,
        ad_accounts: &[String],
        initial: bool,
    ) -> Result<Vec<WindowEntry>> {
        let sync_id = uuid::Uuid::new_v4();
        let lookback_days = if initial {
            self.config.initial_lookback_days
        } else {
            self.config.incremental_lookback_days
        };
        let lookback = DateRange::lookback(Utc::now().date_naive(), lookback_days)?;
        let windows = lookback.split(channel.max_period_days())?;

        let active = self.active_windows(channel).await?;
        let set_key = channel.active_report_key();
        let mut scheduled = Vec::new();

        for account in ad_accounts {
            for window in &windows {
                // also checks entries registered earlier in this call, so a
                // duplicated account id cannot schedule a window twice
                if active
                    .iter()
                    .chain(scheduled.iter())
                    .any(|entry| entry.matches(account, window))
                {
                    counter!("adsync_tracker_windows_skipped_total", "channel" => channel.as_str())
                        .increment(1);
                    debug!(%sync_id, account = %account, window = %window, "Window already in flight, skipping");
                    continue;
                }

                let entry = WindowEntry::queuing(account, *window);
                self.store
                    .sadd(&set_key, &to_canonical_json(&entry)?)
                    .await?;
                counter!("adsync_tracker_windows_scheduled_total", "channel" => channel.as_str())
                    .increment(1);
                scheduled.push(entry);
            }
        }

        self.touch_ttl(&set_key).await?;

        info!(
            %sync_id,
            channel = %channel,
            lookback = %lookback,
            scheduled = scheduled.len(),
            "Report windows scheduled"
        );
        Ok(scheduled)
    }

    /// Record a status transition for one window.
    ///
    /// Any previous entry with the same identity is removed first (a silent
    /// no-op when absent), then the new entry is added. Terminal statuses
    /// stay visible until the set's TTL evicts them.
    #[instrument(skip(self), fields(channel = %channel, account = %ad_account_id, window = %range, status = status.as_str()))]
    pub async fn report_status(
        &self,
        channel: Channel,
        ad_account_id: &str,
        range: DateRange,
        status: JobStatus,
        task_id: Option<String>,
    ) -> Result<()> {
        let set_key = channel.active_report_key();

        for existing in self.active_windows(channel).await? {
            if existing.matches(ad_account_id, &range) {
                self.store
                    .srem(&set_key, &to_canonical_json(&existing)?)
                    .await?;
            }
        }

        let entry = WindowEntry {
            ad_account_id: ad_account_id.to_string(),
            since: range.since,
            until: range.until,
            status,
            task_id,
        };
        self.store
            .sadd(&set_key, &to_canonical_json(&entry)?)
            .await?;
        self.touch_ttl(&set_key).await?;

        counter!(
            "adsync_tracker_status_reports_total",
            "channel" => channel.as_str(),
            "status" => status.as_str(),
        )
        .increment(1);
        Ok(())
    }

    /// All tracked windows of a channel. Members that no longer parse are
    /// logged and skipped.
    pub async fn active_windows(&self, channel: Channel) -> Result<Vec<WindowEntry>> {
        let members = self.store.smembers(&channel.active_report_key()).await?;
        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            match serde_json::from_str::<WindowEntry>(&member) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!(channel = %channel, %err, "Dropping unparseable tracker entry");
                }
            }
        }
        Ok(entries)
    }

    /// Refresh the processing ceiling on a channel set.
    async fn touch_ttl(&self, set_key: &str) -> Result<()> {
        self.store.expire(set_key, self.config.entry_ttl_secs).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tracker() -> (Arc<MemoryStore>, JobStatusTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker = JobStatusTracker::new(store.clone(), TrackerConfig::default());
        (store, tracker)
    }

    fn range(y: i32, m: u32, d: u32, days: u64) -> DateRange {
        let since = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        DateRange {
            since,
            until: since + chrono::Days::new(days - 1),
        }
    }

    #[tokio::test]
    async fn test_incremental_schedule_registers_one_window_per_account() {
        let (_store, tracker) = tracker();
        let accounts = vec!["acc-1".to_string(), "acc-2".to_string()];

        // 7-day incremental lookback fits every channel cap in one window
        let scheduled = tracker
            .schedule_windows(Channel::MetaAds, &accounts, false)
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 2);
        assert!(scheduled.iter().all(|e| e.status == JobStatus::Queuing));
        assert!(scheduled.iter().all(|e| e.range().days() == 7));

        let active = tracker.active_windows(Channel::MetaAds).await.unwrap();
        assert_eq!(active.len(), 2);
    }

    #[tokio::test]
    async fn test_initial_schedule_splits_to_channel_cap() {
        let (_store, tracker) = tracker();
        let accounts = vec!["acc-1".to_string()];

        // 365-day lookback against a 90-day cap gives ceil(365/90) windows
        let scheduled = tracker
            .schedule_windows(Channel::MetaAds, &accounts, true)
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 5);
        assert!(scheduled.iter().all(|e| e.range().days() <= 90));
    }

    #[tokio::test]
    async fn test_duplicate_account_ids_schedule_each_window_once() {
        let (store, tracker) = tracker();
        let accounts = vec!["acc-1".to_string(), "acc-1".to_string()];

        let scheduled = tracker
            .schedule_windows(Channel::MetaAds, &accounts, false)
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 1);

        let members = store
            .smembers(&Channel::MetaAds.active_report_key())
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn test_rescheduling_in_flight_windows_is_idempotent() {
        let (_store, tracker) = tracker();
        let accounts = vec!["acc-1".to_string()];

        let first = tracker
            .schedule_windows(Channel::GoogleAds, &accounts, false)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = tracker
            .schedule_windows(Channel::GoogleAds, &accounts, false)
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(tracker.active_windows(Channel::GoogleAds).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_report_status_replaces_only_matching_window() {
        let (_store, tracker) = tracker();
        let first = range(2021, 1, 1, 30);
        let second = range(2021, 1, 31, 30);

        tracker
            .report_status(Channel::TikTokAds, "acc-1", first, JobStatus::Queuing, None)
            .await
            .unwrap();
        tracker
            .report_status(Channel::TikTokAds, "acc-1", second, JobStatus::Queuing, None)
            .await
            .unwrap();

        tracker
            .report_status(
                Channel::TikTokAds,
                "acc-1",
                first,
                JobStatus::Success,
                Some("task-9".to_string()),
            )
            .await
            .unwrap();

        let active = tracker.active_windows(Channel::TikTokAds).await.unwrap();
        assert_eq!(active.len(), 2);

        let done = active.iter().find(|e| e.matches("acc-1", &first)).unwrap();
        assert_eq!(done.status, JobStatus::Success);
        assert_eq!(done.task_id.as_deref(), Some("task-9"));

        let sibling = active.iter().find(|e| e.matches("acc-1", &second)).unwrap();
        assert_eq!(sibling.status, JobStatus::Queuing);
    }

    #[tokio::test]
    async fn test_status_transition_with_same_identity_different_task_id() {
        let (_store, tracker) = tracker();
        let window = range(2021, 3, 1, 7);

        tracker
            .report_status(
                Channel::MetaAds,
                "acc-1",
                window,
                JobStatus::Processing,
                Some("task-a".to_string()),
            )
            .await
            .unwrap();
        tracker
            .report_status(
                Channel::MetaAds,
                "acc-1",
                window,
                JobStatus::Failed,
                Some("task-b".to_string()),
            )
            .await
            .unwrap();

        // identity keying keeps exactly one entry for the window
        let active = tracker.active_windows(Channel::MetaAds).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, JobStatus::Failed);
        assert_eq!(active[0].task_id.as_deref(), Some("task-b"));
    }

    #[tokio::test]
    async fn test_reporting_status_for_unknown_window_still_records_it() {
        let (_store, tracker) = tracker();
        let window = range(2021, 5, 1, 7);

        // removal of the non-existent predecessor is a silent no-op
        tracker
            .report_status(Channel::AmazonAds, "acc-1", window, JobStatus::Processing, None)
            .await
            .unwrap();

        let active = tracker.active_windows(Channel::AmazonAds).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_identical_entries_deduplicate_in_store() {
        let (store, tracker) = tracker();
        let window = range(2021, 6, 1, 7);

        tracker
            .report_status(Channel::GoogleAds, "acc-1", window, JobStatus::Queuing, None)
            .await
            .unwrap();
        tracker
            .report_status(Channel::GoogleAds, "acc-1", window, JobStatus::Queuing, None)
            .await
            .unwrap();

        let members = store
            .smembers(&Channel::GoogleAds.active_report_key())
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let (_store, tracker) = tracker();
        let window = range(2021, 7, 1, 7);

        tracker
            .report_status(Channel::GoogleAds, "acc-1", window, JobStatus::Queuing, None)
            .await
            .unwrap();

        assert!(tracker.active_windows(Channel::MetaAds).await.unwrap().is_empty());
        assert_eq!(tracker.active_windows(Channel::GoogleAds).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_members_are_skipped() {
        let (store, tracker) = tracker();
        store
            .sadd(&Channel::MetaAds.active_report_key(), "not json")
            .await
            .unwrap();
        let window = range(2021, 8, 1, 7);
        tracker
            .report_status(Channel::MetaAds, "acc-1", window, JobStatus::Queuing, None)
            .await
            .unwrap();

        let active = tracker.active_windows(Channel::MetaAds).await.unwrap();
        assert_eq!(active.len(), 1);
    }
}
