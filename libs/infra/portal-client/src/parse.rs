//! Record extraction from a portal list-page response body: JSON first,
//! HTML table fallback. Never panics on a malformed row — rows that can't
//! be salvaged are skipped, not propagated as errors (§9's
//! exception-as-control-flow redesign note).

use blacklist_domain_models::RawRecord;
use scraper::{Html, Selector};
use serde_json::Value;

const DETECTION_KEYWORDS: &[&str] = &["탐지", "등록", "reg", "detect"];
const REMOVAL_KEYWORDS: &[&str] = &["해제", "삭제", "del", "remove"];
const REASON_KEYWORDS: &[&str] = &["사유", "reason", "내용", "content"];

/// Parses a list-page response body into raw records, trying JSON first and
/// falling back to HTML table extraction on JSON decode failure.
pub fn parse_records(body: &str) -> Vec<RawRecord> {
    if let Some(records) = try_parse_json(body) {
        return records;
    }
    parse_html_tables(body)
}

fn try_parse_json(body: &str) -> Option<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let array = match value {
        Value::Array(items) => items,
        Value::Object(ref map) => match map.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => return None,
        },
        _ => return None,
    };

    Some(
        array
            .into_iter()
            .filter_map(|item| record_from_json_object(&item))
            .collect(),
    )
}

fn record_from_json_object(item: &Value) -> Option<RawRecord> {
    let obj = item.as_object()?;
    let ip_address = first_present(obj, &["ip_address", "ip", "ipAddr"]);
    Some(RawRecord {
        ip_address,
        country: first_present(obj, &["country", "countryCode", "nation"]),
        reason: first_present(obj, &["reason", "description", "content"]),
        detection_date: first_present(obj, &["detection_date", "detectDate", "regDate"]),
        removal_date: first_present(obj, &["removal_date", "delDate", "releaseDate"]),
        confidence_hint: first_present(obj, &["confidence", "severity", "riskLevel"]),
        raw: item.clone(),
    })
}

fn first_present(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

fn parse_html_tables(body: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(body);
    let table_selector = Selector::parse("table").expect("static selector is valid");
    let row_selector = Selector::parse("tr").expect("static selector is valid");
    let cell_selector = Selector::parse("td,th").expect("static selector is valid");

    let mut records = Vec::new();

    for table in document.select(&table_selector) {
        let mut rows = table.select(&row_selector);
        let header_row = rows.next();
        let header_cells: Vec<String> = header_row
            .map(|row| {
                row.select(&cell_selector)
                    .map(|cell| cell.text().collect::<String>().trim().to_lowercase())
                    .collect()
            })
            .unwrap_or_default();
        let header_looks_like_header = header_cells.iter().any(|cell| {
            DETECTION_KEYWORDS
                .iter()
                .chain(REMOVAL_KEYWORDS)
                .chain(REASON_KEYWORDS)
                .any(|kw| cell.contains(kw))
        });

        let data_rows: Vec<_> = if header_looks_like_header {
            rows.collect()
        } else {
            header_row.into_iter().chain(rows).collect()
        };

        for row in data_rows {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            if let Some(record) = record_from_row(&cells, &header_cells) {
                records.push(record);
            }
        }
    }

    records
}

fn record_from_row(cells: &[String], header_cells: &[String]) -> Option<RawRecord> {
    let ip_index = cells
        .iter()
        .position(|cell| blacklist_domain_normalizer::validate_public_ip(cell).is_some())?;
    let ip_address = cells[ip_index].clone();

    let (country, reason, detection_date, removal_date) = if cells.len() >= 5 {
        (
            cells.get(1).cloned(),
            cells.get(2).cloned(),
            cells.get(3).cloned(),
            cells.get(4).cloned(),
        )
    } else {
        (
            None,
            find_by_keyword(cells, header_cells, REASON_KEYWORDS),
            find_by_keyword(cells, header_cells, DETECTION_KEYWORDS)
                .or_else(|| find_date_in_range(cells, 1, 5)),
            find_by_keyword(cells, header_cells, REMOVAL_KEYWORDS),
        )
    };

    Some(RawRecord {
        ip_address: Some(ip_address.clone()),
        country,
        reason,
        detection_date,
        removal_date,
        confidence_hint: None,
        raw: Value::Array(cells.iter().map(|c| Value::String(c.clone())).collect()),
    })
}

fn find_by_keyword(cells: &[String], header_cells: &[String], keywords: &[&str]) -> Option<String> {
    header_cells
        .iter()
        .position(|header| keywords.iter().any(|kw| header.contains(kw)))
        .and_then(|index| cells.get(index).cloned())
        .filter(|s| !s.is_empty())
}

fn find_date_in_range(cells: &[String], start: usize, end: usize) -> Option<String> {
    cells
        .iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .find(|cell| blacklist_domain_normalizer::parse_flexible_date(cell).is_some())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_array() {
        let body = r#"[{"ip_address": "1.2.3.4", "country": "KR", "reason": "c2"}]"#;
        let records = parse_records(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn parses_data_envelope_json() {
        let body = r#"{"data": [{"ip": "5.6.7.8"}]}"#;
        let records = parse_records(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address.as_deref(), Some("5.6.7.8"));
    }

    #[test]
    fn falls_back_to_html_table_on_invalid_json() {
        let body = r#"
            <table>
                <tr><th>IP</th><th>Country</th><th>Reason</th><th>Detect</th><th>Remove</th></tr>
                <tr><td>1.2.3.4</td><td>KR</td><td>malware</td><td>2026-01-01</td><td>2026-02-01</td></tr>
            </table>
        "#;
        let records = parse_records(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(records[0].country.as_deref(), Some("KR"));
    }

    #[test]
    fn skips_rows_with_no_valid_ip_instead_of_panicking() {
        let body = "<table><tr><td>not-an-ip</td><td>x</td></tr></table>";
        let records = parse_records(body);
        assert!(records.is_empty());
    }
}
