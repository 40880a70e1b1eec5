//! Normalize and filter raw scraped records into UPSERT-ready rows (C4).
//!
//! This is a pure function pipeline: no I/O, no clock reads beyond the
//! caller-supplied `today`, deterministic given its inputs. The persistence
//! layer and ingest API both route through [`normalize_batch`] so the
//! filtering rules apply identically regardless of entry point.

use std::collections::HashSet;
use std::net::IpAddr;

use blacklist_domain_models::{NormalizationReport, NormalizedRecord, RawRecord};
use chrono::NaiveDate;
use serde_json::{json, Value};

/// Hard cap on records accumulated within a single normalization run, to
/// bound memory on a pathological upstream response. Beyond this the
/// remaining records in the batch are dropped and the report's
/// `deduplicated` counter absorbs the difference.
pub const DEDUP_CAP: usize = 1_000_000;

/// Runs the full C4 pipeline over `records`, returning the accepted,
/// normalized rows plus a report of what was excluded and why.
pub fn normalize_batch(records: Vec<RawRecord>, today: NaiveDate) -> (Vec<NormalizedRecord>, NormalizationReport) {
    let mut report = NormalizationReport::default();
    let mut seen_ips: HashSet<String> = HashSet::new();
    let mut accepted = Vec::new();

    for record in records {
        let Some(ip_str) = record.ip_address.as_deref() else {
            report.excluded_private_or_invalid += 1;
            continue;
        };

        let Some(ip) = validate_public_ip(ip_str) else {
            report.excluded_private_or_invalid += 1;
            continue;
        };

        if seen_ips.len() >= DEDUP_CAP {
            report.deduplicated += 1;
            continue;
        }
        if !seen_ips.insert(ip.to_string()) {
            report.deduplicated += 1;
            continue;
        }

        let removal_date = record
            .removal_date
            .as_deref()
            .and_then(parse_flexible_date);
        if let Some(removal_date) = removal_date {
            if removal_date < today {
                report.expired += 1;
                continue;
            }
        }

        let detection_date = record
            .detection_date
            .as_deref()
            .and_then(parse_flexible_date)
            .unwrap_or(today);

        let confidence = map_confidence(record.confidence_hint.as_deref());
        let is_active = removal_date.map(|d| d >= today).unwrap_or(true);
        let country = normalize_country(record.country.as_deref());
        let reason = preserve_reason(record.reason.as_deref());
        let raw_payload = build_raw_payload(&record, ip_str);

        accepted.push(NormalizedRecord {
            ip_address: ip.to_string(),
            source: String::new(), // filled in by the caller, which knows the source name
            country,
            reason,
            confidence,
            detection_date,
            removal_date,
            is_active,
            raw_payload,
        });
        report.accepted += 1;
    }

    (accepted, report)
}

/// Parses `ip_str` and rejects private, loopback, link-local, multicast,
/// unspecified, and reserved addresses (I2, P3).
pub fn validate_public_ip(ip_str: &str) -> Option<IpAddr> {
    let ip: IpAddr = ip_str.trim().parse().ok()?;
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
                || v4.is_reserved()
            {
                None
            } else {
                Some(IpAddr::V4(v4))
            }
        }
        IpAddr::V6(v6) => {
            let is_unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            if v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || is_unique_local
                || is_v6_link_local(&v6)
            {
                None
            } else {
                Some(IpAddr::V6(v6))
            }
        }
    }
}

fn is_v6_link_local(v6: &std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

/// Maps upstream severity vocabulary to a confidence score (I3). Integers
/// already in `[0, 100]` pass through unchanged, clamped otherwise.
pub fn map_confidence(hint: Option<&str>) -> i32 {
    let Some(hint) = hint else { return 50 };
    let trimmed = hint.trim();

    if let Ok(n) = trimmed.parse::<i32>() {
        return n.clamp(0, 100);
    }

    match trimmed.to_lowercase().as_str() {
        "critical" => 95,
        "high" => 90,
        "medium" => 50,
        "low" => 10,
        "unknown" => 5,
        _ => 50,
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`, `YYYYMMDD`, and
/// `MM/DD/YYYY`; the first format that parses wins.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Maps common English/Korean/ISO country forms to an ISO-2 code. Unknown
/// values fall back to their first two uppercase letters if alphabetic,
/// else `None` — storage and domain types stay nullable throughout; no
/// `"Unknown"` placeholder is ever persisted.
pub fn normalize_country(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let normalized = match raw {
        "Korea" | "South Korea" | "한국" | "대한민국" | "KR" | "kr" => "KR",
        "China" | "중국" | "CN" | "cn" => "CN",
        "United States" | "USA" | "US" | "us" => "US",
        "Russia" | "러시아" | "RU" | "ru" => "RU",
        "Japan" | "일본" | "JP" | "jp" => "JP",
        other => {
            let letters: String = other
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .take(2)
                .collect::<String>()
                .to_uppercase();
            return if letters.len() == 2 { Some(letters) } else { None };
        }
    };
    Some(normalized.to_string())
}

/// Prefers specific, non-default upstream text; longer text wins when both
/// candidates are present, since upstream placeholders tend to be terse.
pub fn preserve_reason(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => "unspecified".to_string(),
    }
}

fn build_raw_payload(record: &RawRecord, ip_str: &str) -> Value {
    if !record.raw.is_null() {
        return record.raw.clone();
    }
    json!({
        "ip_address": ip_str,
        "country": record.country,
        "reason": record.reason,
        "detection_date": record.detection_date,
        "removal_date": record.removal_date,
        "collection_timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ip: &str) -> RawRecord {
        RawRecord {
            ip_address: Some(ip.to_string()),
            country: Some("Korea".to_string()),
            reason: Some("malware C2".to_string()),
            detection_date: Some("2026-01-01".to_string()),
            removal_date: None,
            confidence_hint: Some("high".to_string()),
            raw: Value::Null,
        }
    }

    #[test]
    fn rejects_private_addresses() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (accepted, report) = normalize_batch(vec![raw("192.168.0.1")], today);
        assert!(accepted.is_empty());
        assert_eq!(report.excluded_private_or_invalid, 1);
    }

    #[test]
    fn rejects_loopback_and_link_local() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (_, report) = normalize_batch(vec![raw("127.0.0.1"), raw("169.254.1.1")], today);
        assert_eq!(report.excluded_private_or_invalid, 2);
    }

    #[test]
    fn accepts_public_ip_and_maps_confidence() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (accepted, report) = normalize_batch(vec![raw("1.2.3.4")], today);
        assert_eq!(report.accepted, 1);
        assert_eq!(accepted[0].confidence, 90);
        assert_eq!(accepted[0].country.as_deref(), Some("KR"));
    }

    #[test]
    fn rejects_expired_removal_date() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let mut record = raw("1.2.3.4");
        record.removal_date = Some("2026-01-01".to_string());
        let (accepted, report) = normalize_batch(vec![record], today);
        assert!(accepted.is_empty());
        assert_eq!(report.expired, 1);
    }

    #[test]
    fn dedups_within_run_keeping_first_occurrence() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let (accepted, report) = normalize_batch(vec![raw("1.2.3.4"), raw("1.2.3.4")], today);
        assert_eq!(accepted.len(), 1);
        assert_eq!(report.deduplicated, 1);
    }

    #[test]
    fn parses_all_supported_date_formats() {
        assert!(parse_flexible_date("2026-01-02").is_some());
        assert!(parse_flexible_date("2026/01/02").is_some());
        assert!(parse_flexible_date("2026.01.02").is_some());
        assert!(parse_flexible_date("20260102").is_some());
        assert!(parse_flexible_date("01/02/2026").is_some());
    }

    #[test]
    fn unknown_country_falls_back_to_letters_or_null() {
        assert_eq!(normalize_country(Some("Brazil")), Some("BR".to_string()));
        assert_eq!(normalize_country(Some("123")), None);
        assert_eq!(normalize_country(None), None);
    }
}
