//! Sampling and date helpers shared by both adapters.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;

use crate::constants::{DATE_FORMAT, DEFAULT_DATETIME};

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Polar Box-Muller draw from N(0, 1)
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let x1 = 2.0 * rng.gen::<f64>() - 1.0;
        let x2 = 2.0 * rng.gen::<f64>() - 1.0;
        let w = x1 * x1 + x2 * x2;
        if w > 0.0 && w < 1.0 {
            return x1 * ((-2.0 * w.ln()) / w).sqrt();
        }
    }
}

/// Normal draw folded onto the positive half-line: `|mean + sd * z|`.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    (mean + sd * standard_normal(rng)).abs()
}

/// Half-normal draw anchored at `mean`. With `left` the value never exceeds
/// the mean, otherwise it never falls below it.
pub fn normal_one_side<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64, left: bool) -> f64 {
    let offset = (sd * standard_normal(rng)).abs();
    if left {
        mean - offset
    } else {
        mean + offset
    }
}

/// Uniform integer in the inclusive range `[min, max]`.
pub fn random_int<R: Rng + ?Sized>(rng: &mut R, min: usize, max: usize) -> usize {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

/// Whole days between two instants, rounded to the nearest day.
pub fn days_elapsed(past: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let diff_ms = (now - past).num_milliseconds().unsigned_abs() as f64;
    (diff_ms / MILLIS_PER_DAY).round()
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Timestamp assigned to nodes that have never been played.
pub fn default_timestamp() -> DateTime<Utc> {
    parse_timestamp(DEFAULT_DATETIME).unwrap_or_default()
}

/// Whole-second precision, as stored in documents.
pub fn now_truncated() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

/// Serde adapter storing timestamps in the sortable `yyyy-MM-ddTHH:mm:ss` layout.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
