//! Conversion of adapter output into canonical [`Release`] values.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{RawRelease, Release, ReleaseKey, ReportedAge, ReportedSize};
use crate::indexer::IndexerDescriptor;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d[\d,]*(?:\.\d+)?)\s*(bytes?|[kmgtp]?i?b)?\s*$").unwrap()
});
static CLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());
static MONTH_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})(?:\s+(\d{1,2}):(\d{2}))?$").unwrap());
static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago$")
        .unwrap()
});

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a human size such as "1.4 GiB", "700MB" or "1,234,567".
///
/// Units are binary multiples; a bare number is bytes.
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(text)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let exponent = match unit.chars().next() {
        None | Some('b') => 0,
        Some('k') => 1,
        Some('m') => 2,
        Some('g') => 3,
        Some('t') => 4,
        Some('p') => 5,
        Some(_) => return None,
    };
    Some((value * 1024f64.powi(exponent)).round() as u64)
}

pub fn size_bytes(size: &ReportedSize) -> u64 {
    match size {
        ReportedSize::Bytes(b) => *b,
        ReportedSize::Text(t) => parse_size(t).unwrap_or(0),
        ReportedSize::Unknown => 0,
    }
}

/// Parse publication text into an instant, relative to `now` where needed.
pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ndt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }

    let lower = text.to_ascii_lowercase();
    if lower.contains("today") {
        return Some(at_clock(now, text).unwrap_or(now));
    }
    if lower.contains("y-day") || lower.contains("yesterday") {
        let day = now - Duration::days(1);
        return Some(at_clock(day, text).unwrap_or(day));
    }

    if let Some(caps) = RELATIVE_RE.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_ascii_lowercase();
        // Upstream text can hold any number; out-of-range ages are unknown.
        let delta = match unit.trim_end_matches('s') {
            "second" | "sec" => Duration::try_seconds(n),
            "minute" | "min" => Duration::try_minutes(n),
            "hour" | "hr" => Duration::try_hours(n),
            "day" => Duration::try_days(n),
            "week" => Duration::try_weeks(n),
            "month" => n.checked_mul(30).and_then(Duration::try_days),
            "year" => n.checked_mul(365).and_then(Duration::try_days),
            _ => return None,
        }?;
        return now.checked_sub_signed(delta);
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let hour: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let minute: u32 = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let build = |year: i32| {
            Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
                .single()
        };
        let year = now.year();
        // No year given: a date later than now belongs to last year.
        return match build(year)? {
            dt if dt > now => build(year - 1),
            dt => Some(dt),
        };
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(from_unix);
    }

    None
}

fn at_clock(day: DateTime<Utc>, text: &str) -> Option<DateTime<Utc>> {
    let caps = CLOCK_RE.captures(text)?;
    let time = NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)?;
    Some(day.date_naive().and_time(time).and_utc())
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn published_at(age: &ReportedAge, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match age {
        ReportedAge::At(dt) => Some(*dt),
        ReportedAge::UnixSeconds(secs) if *secs > 0 => from_unix(*secs),
        ReportedAge::UnixSeconds(_) => None,
        ReportedAge::Text(text) => parse_date(text, now),
        ReportedAge::Unknown => None,
    }
}

/// Seconds elapsed between publication and `now`; future dates clamp to 0.
pub fn age_secs(published: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - published).num_seconds().max(0) as u64
}

/// Turn one adapter entry into a canonical release.
pub fn normalize_release(
    raw: RawRelease,
    indexer: &IndexerDescriptor,
    now: DateTime<Utc>,
) -> Release {
    let published = published_at(&raw.age, now);
    Release {
        key: ReleaseKey::new(&indexer.id, raw.guid.trim()),
        protocol: indexer.protocol,
        title: raw.title.trim().to_string(),
        size_bytes: size_bytes(&raw.size),
        age_secs: published.map(|p| age_secs(p, now)),
        published_at: published,
        seeders: raw.seeders,
        leechers: raw.leechers,
        grabs: raw.grabs.unwrap_or(0),
        categories: raw.categories,
        download: raw.download,
        details_url: raw.details_url.filter(|u| !u.is_empty()),
        info_hash: raw
            .info_hash
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty()),
        indexer_id: indexer.id.clone(),
        indexer_name: indexer.name.clone(),
        indexer_priority: indexer.priority,
    }
}
