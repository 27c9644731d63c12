//! Proactive refresh scheduling
//!
//! The refresh fires at the later of 75% of the remaining lifetime and
//! five minutes before expiry, where the latter term is clamped to zero
//! or below. For any positive remaining lifetime this reduces to 75% of
//! it; an expired or undecodable token refreshes immediately.

use std::time::Duration;

use chrono::{DateTime, Utc};
use newsline_domain::constants::{REFRESH_FLOOR_SECS, REFRESH_LIFETIME_FRACTION};

/// When the next refresh should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// Refresh right away
    Immediate,
    /// Refresh after the given delay
    After(Duration),
}

impl RefreshPlan {
    /// Delay to sleep before refreshing (zero for [`RefreshPlan::Immediate`])
    pub fn delay(&self) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::After(delay) => *delay,
        }
    }
}

/// Plan a refresh for a token with `time_until_expiry` left
pub fn plan_refresh(time_until_expiry: chrono::Duration) -> RefreshPlan {
    let remaining_ms = time_until_expiry.num_milliseconds();
    let proportional = remaining_ms as f64 * REFRESH_LIFETIME_FRACTION;
    let floor = remaining_ms.saturating_sub(REFRESH_FLOOR_SECS * 1000).min(0) as f64;
    let delay_ms = proportional.max(floor);

    if delay_ms <= 0.0 {
        RefreshPlan::Immediate
    } else {
        RefreshPlan::After(Duration::from_millis(delay_ms as u64))
    }
}

/// Plan a refresh for a token expiring at `expires_at`, as seen from `now`
pub fn plan_refresh_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> RefreshPlan {
    plan_refresh(expires_at - now)
}
