//! Recurrence expressions for routines.
//!
//! Standard 5-field cron: `minute hour day-of-month month day-of-week`,
//! evaluated in UTC. Supports `*`, `*/S` (step), `N` (literal), `N-M`
//! (range), `N-M/S` and `N,M` (list). Day-of-week is 0–6 with 0 = Sunday;
//! 7 is accepted as Sunday too.
//!
//! When both day fields are restricted a day matches if *either* matches,
//! as in classic cron.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// How far back (or forward) firing searches look, in days.
const SEARCH_DAYS: u32 = 5 * 366;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid recurrence '{expr}': {reason}")]
pub struct RecurrenceError {
    pub expr: String,
    pub reason: String,
}

/// A parsed recurrence expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
    dom_star: bool,
    dow_star: bool,
}

impl Recurrence {
    pub fn parse(expr: &str) -> Result<Self, RecurrenceError> {
        Self::parse_inner(expr).map_err(|reason| RecurrenceError {
            expr: expr.to_string(),
            reason,
        })
    }

    fn parse_inner(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        let mut days_of_week = Self::parse_field(fields[4], 0, 7)?;
        if days_of_week.contains(&7) {
            days_of_week.retain(|d| *d != 7);
            if !days_of_week.contains(&0) {
                days_of_week.insert(0, 0);
            }
        }

        Ok(Recurrence {
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week,
            dom_star: fields[2].starts_with('*'),
            dow_star: fields[4].starts_with('*'),
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();

            if let Some((base, step)) = part.split_once('/') {
                let step: u32 = step.parse().map_err(|_| format!("invalid step: {step}"))?;
                if step == 0 {
                    return Err("step cannot be zero".into());
                }
                let (start, end) = if base == "*" {
                    (min, max)
                } else if base.contains('-') {
                    Self::parse_range(base, min, max)?
                } else {
                    (Self::parse_literal(base, min, max)?, max)
                };
                values.extend((start..=end).step_by(step as usize));
            } else if part.contains('-') {
                let (start, end) = Self::parse_range(part, min, max)?;
                values.extend(start..=end);
            } else if part == "*" {
                values.extend(min..=max);
            } else {
                values.push(Self::parse_literal(part, min, max)?);
            }
        }

        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err("field produced no values".into());
        }
        Ok(values)
    }

    fn parse_literal(s: &str, min: u32, max: u32) -> Result<u32, String> {
        let v: u32 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
        if v < min || v > max {
            return Err(format!("{v} out of range {min}-{max}"));
        }
        Ok(v)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid range: {s}"))?;
        let start: u32 = start
            .parse()
            .map_err(|_| format!("invalid range start: {start}"))?;
        let end: u32 = end.parse().map_err(|_| format!("invalid range end: {end}"))?;
        if start < min || end > max || start > end {
            return Err(format!("range {start}-{end} invalid for {min}-{max}"));
        }
        Ok((start, end))
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        if self.dom_star || self.dow_star {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// Check if the given instant falls on a firing minute.
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.day_matches(dt.date_naive())
            && self.hours.contains(&dt.hour())
            && self.minutes.contains(&dt.minute())
    }

    /// The most recent firing instant at or before `t`, minute-aligned.
    pub fn last_fire_at_or_before(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = t.date_naive();
        for day in 0..SEARCH_DAYS {
            if self.day_matches(date) {
                let limit = if day == 0 {
                    (t.hour(), t.minute())
                } else {
                    (23, 59)
                };
                if let Some((h, m)) = self.latest_time_at_or_before(limit) {
                    return Some(Utc.from_utc_datetime(&date.and_hms_opt(h, m, 0)?));
                }
            }
            date = date.pred_opt()?;
        }
        None
    }

    /// The first firing instant strictly after `t`, minute-aligned.
    pub fn next_fire_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = t.date_naive();
        for day in 0..SEARCH_DAYS {
            if self.day_matches(date) {
                let floor = if day == 0 {
                    Some((t.hour(), t.minute()))
                } else {
                    None
                };
                if let Some((h, m)) = self.earliest_time_after(floor) {
                    return Some(Utc.from_utc_datetime(&date.and_hms_opt(h, m, 0)?));
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn latest_time_at_or_before(&self, (hour, minute): (u32, u32)) -> Option<(u32, u32)> {
        for &h in self.hours.iter().rev().filter(|h| **h <= hour) {
            let m = if h < hour {
                self.minutes.last().copied()
            } else {
                self.minutes.iter().rev().find(|m| **m <= minute).copied()
            };
            if let Some(m) = m {
                return Some((h, m));
            }
        }
        None
    }

    fn earliest_time_after(&self, floor: Option<(u32, u32)>) -> Option<(u32, u32)> {
        let Some((hour, minute)) = floor else {
            return Some((*self.hours.first()?, *self.minutes.first()?));
        };
        for &h in self.hours.iter().filter(|h| **h >= hour) {
            let m = if h > hour {
                self.minutes.first().copied()
            } else {
                self.minutes.iter().find(|m| **m > minute).copied()
            };
            if let Some(m) = m {
                return Some((h, m));
            }
        }
        None
    }
}

impl std::str::FromStr for Recurrence {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recurrence::parse(s)
    }
}
