//! Per-record selection windows
//!
//! Each record gets a fresh window centered on an anchor timestamp. The
//! anchor is either the test-administered time or the infection onset time.

use chrono::{DateTime, Duration, Utc};

use crate::config::ExtractorConfig;
use crate::types::ExposureResult;

/// Which record timestamp the window is centered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAnchor {
    TestAdministered,
    InfectionOnset,
}

/// Inclusive time range of admissible exposure times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub left: DateTime<Utc>,
    pub right: DateTime<Utc>,
}

impl DateWindow {
    /// Window from `days_before` days before `anchor` to `days_after` days after it
    pub fn around(anchor: DateTime<Utc>, days_before: i64, days_after: i64) -> Self {
        Self {
            left: offset_days(anchor, days_before.saturating_neg()),
            right: offset_days(anchor, days_after),
        }
    }

    /// Both ends are inclusive
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.left <= time && time <= self.right
    }
}

/// `time` shifted by whole days, saturating at the representable range
fn offset_days(time: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let saturated = if days < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    Duration::try_days(days)
        .and_then(|offset| time.checked_add_signed(offset))
        .unwrap_or(saturated)
}

/// Computes the window for each record
#[derive(Debug, Clone)]
pub struct WindowSelector {
    anchor: WindowAnchor,
    days_before: i64,
    days_after: i64,
}

impl WindowSelector {
    pub fn new(anchor: WindowAnchor, days_before: i64, days_after: i64) -> Self {
        Self {
            anchor,
            days_before,
            days_after,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        let anchor = if config.window_around_infection_onset {
            WindowAnchor::InfectionOnset
        } else {
            WindowAnchor::TestAdministered
        };
        Self::new(
            anchor,
            config.window_days_before_anchor,
            config.window_days_after_anchor,
        )
    }

    pub fn anchor(&self) -> WindowAnchor {
        self.anchor
    }

    /// Window for `record`, or `None` when the record has no usable anchor.
    ///
    /// Test-anchored windows always exist; an unset test time is the epoch,
    /// the zero value the store's producer writes for it.
    pub fn window_for(&self, record: &ExposureResult) -> Option<DateWindow> {
        let anchor = match self.anchor {
            WindowAnchor::TestAdministered => match record.test_administered_time {
                Some(time) => time,
                None => {
                    log::warn!(
                        "agent {} has no test administered time, anchoring at the epoch",
                        record.agent_uuid
                    );
                    DateTime::<Utc>::UNIX_EPOCH
                }
            },
            WindowAnchor::InfectionOnset => record.infection_onset_time?,
        };

        Some(DateWindow::around(anchor, self.days_before, self.days_after))
    }
}
