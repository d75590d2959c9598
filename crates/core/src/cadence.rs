//! Annoyance cadence policy: how long to wait before pinging again.
//!
//! Each tier maps to a closed range of minutes; the actual delay is drawn
//! uniformly at second resolution so reminders from many tasks don't line
//! up on the same instant.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::task::Annoyance;

/// An inclusive delay range in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteRange {
    pub min_minutes: u32,
    pub max_minutes: u32,
}

impl MinuteRange {
    pub const fn new(min_minutes: u32, max_minutes: u32) -> Self {
        Self {
            min_minutes,
            max_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadencePolicy {
    pub low: MinuteRange,
    pub med: MinuteRange,
    pub high: MinuteRange,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            low: MinuteRange::new(120, 180),
            med: MinuteRange::new(30, 60),
            high: MinuteRange::new(1, 5),
        }
    }
}

impl CadencePolicy {
    pub fn range(&self, tier: Annoyance) -> MinuteRange {
        match tier {
            Annoyance::Low => self.low,
            Annoyance::Med => self.med,
            Annoyance::High => self.high,
        }
    }

    /// Draw a delay for `tier`.
    pub fn delay<R: Rng + ?Sized>(&self, tier: Annoyance, rng: &mut R) -> Duration {
        let range = self.range(tier);
        let lo = i64::from(range.min_minutes) * 60;
        let hi = i64::from(range.max_minutes.max(range.min_minutes)) * 60;
        Duration::seconds(rng.random_range(lo..=hi))
    }

    /// Next ping instant measured from `base`.
    pub fn next_ping_at<R: Rng + ?Sized>(
        &self,
        tier: Annoyance,
        base: DateTime<Utc>,
        rng: &mut R,
    ) -> DateTime<Utc> {
        base + self.delay(tier, rng)
    }

    /// [`Self::next_ping_at`] with the thread-local generator.
    pub fn jittered(&self, tier: Annoyance, base: DateTime<Utc>) -> DateTime<Utc> {
        self.next_ping_at(tier, base, &mut rand::rng())
    }
}
