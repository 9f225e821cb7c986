//! Per-provider usage accounting against daily/monthly ceilings.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Usage ceiling for one provider. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default)]
    pub daily: Option<u64>,
    #[serde(default)]
    pub monthly: Option<u64>,
}

impl QuotaLimits {
    pub fn daily(mut self, limit: u64) -> Self {
        self.daily = Some(limit);
        self
    }

    pub fn monthly(mut self, limit: u64) -> Self {
        self.monthly = Some(limit);
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.daily.is_none() && self.monthly.is_none()
    }
}

/// Usage counters for one provider, in UTC calendar periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub daily: u64,
    pub monthly: u64,
    /// Day the counters were last touched.
    pub period: NaiveDate,
}

impl QuotaUsage {
    fn empty(today: NaiveDate) -> Self {
        Self {
            daily: 0,
            monthly: 0,
            period: today,
        }
    }

    /// Counters as seen on `today`, with elapsed periods reset.
    fn rolled(self, today: NaiveDate) -> Self {
        if self.period == today {
            return self;
        }
        let same_month =
            self.period.year() == today.year() && self.period.month() == today.month();
        Self {
            daily: 0,
            monthly: if same_month { self.monthly } else { 0 },
            period: today,
        }
    }

    pub fn exceeds(&self, limits: &QuotaLimits) -> bool {
        limits.daily.is_some_and(|d| self.daily >= d)
            || limits.monthly.is_some_and(|m| self.monthly >= m)
    }
}

/// Thread-safe usage tracker keyed by provider name.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    usage: Mutex<HashMap<String, QuotaUsage>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of usage for `provider`.
    pub fn record(&self, provider: &str) {
        self.record_at(provider, Utc::now());
    }

    pub fn record_at(&self, provider: &str, now: DateTime<Utc>) {
        let today = now.date_naive();
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = usage
            .entry(provider.to_string())
            .or_insert_with(|| QuotaUsage::empty(today));
        let mut rolled = entry.rolled(today);
        rolled.daily += 1;
        rolled.monthly += 1;
        *entry = rolled;
    }

    /// Current usage for `provider`.
    pub fn usage(&self, provider: &str) -> QuotaUsage {
        self.usage_at(provider, Utc::now())
    }

    pub fn usage_at(&self, provider: &str, now: DateTime<Utc>) -> QuotaUsage {
        let today = now.date_naive();
        let usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        usage
            .get(provider)
            .map(|u| u.rolled(today))
            .unwrap_or_else(|| QuotaUsage::empty(today))
    }

    /// Whether `provider` has reached either ceiling.
    pub fn is_exceeded(&self, provider: &str, limits: &QuotaLimits) -> bool {
        self.is_exceeded_at(provider, limits, Utc::now())
    }

    pub fn is_exceeded_at(&self, provider: &str, limits: &QuotaLimits, now: DateTime<Utc>) -> bool {
        !limits.is_unlimited() && self.usage_at(provider, now).exceeds(limits)
    }

    /// Forget all usage.
    pub fn reset(&self) {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn unknown_provider_has_zero_usage() {
        let tracker = QuotaTracker::new();
        let usage = tracker.usage_at("google", at(2026, 3, 1));
        assert_eq!(usage.daily, 0);
        assert_eq!(usage.monthly, 0);
    }

    #[test]
    fn record_increments_both_counters() {
        let tracker = QuotaTracker::new();
        tracker.record_at("google", at(2026, 3, 1));
        tracker.record_at("google", at(2026, 3, 1));
        let usage = tracker.usage_at("google", at(2026, 3, 1));
        assert_eq!(usage.daily, 2);
        assert_eq!(usage.monthly, 2);
    }

    #[test]
    fn daily_counter_rolls_over_within_month() {
        let tracker = QuotaTracker::new();
        tracker.record_at("google", at(2026, 3, 1));
        tracker.record_at("google", at(2026, 3, 2));
        let usage = tracker.usage_at("google", at(2026, 3, 2));
        assert_eq!(usage.daily, 1);
        assert_eq!(usage.monthly, 2);
    }

    #[test]
    fn monthly_counter_rolls_over() {
        let tracker = QuotaTracker::new();
        tracker.record_at("google", at(2026, 3, 31));
        let usage = tracker.usage_at("google", at(2026, 4, 1));
        assert_eq!(usage.daily, 0);
        assert_eq!(usage.monthly, 0);
    }

    #[test]
    fn exceeded_against_daily_limit() {
        let tracker = QuotaTracker::new();
        let limits = QuotaLimits::default().daily(2);
        let now = at(2026, 3, 1);
        tracker.record_at("mapbox", now);
        assert!(!tracker.is_exceeded_at("mapbox", &limits, now));
        tracker.record_at("mapbox", now);
        assert!(tracker.is_exceeded_at("mapbox", &limits, now));
        // Next day the daily ceiling is fresh again
        assert!(!tracker.is_exceeded_at("mapbox", &limits, at(2026, 3, 2)));
    }

    #[test]
    fn exceeded_against_monthly_limit() {
        let tracker = QuotaTracker::new();
        let limits = QuotaLimits::default().daily(100).monthly(2);
        tracker.record_at("mapbox", at(2026, 3, 1));
        tracker.record_at("mapbox", at(2026, 3, 2));
        assert!(tracker.is_exceeded_at("mapbox", &limits, at(2026, 3, 3)));
        assert!(!tracker.is_exceeded_at("mapbox", &limits, at(2026, 4, 1)));
    }

    #[test]
    fn unlimited_is_never_exceeded() {
        let tracker = QuotaTracker::new();
        for _ in 0..10 {
            tracker.record("osm");
        }
        assert!(!tracker.is_exceeded("osm", &QuotaLimits::default()));
    }
}
