//! Multi-strategy date-range list sweep against the portal's
//! `advisoryList` endpoint (C3). Strategies are tried in order, stopping at
//! the first one that yields any record — a portal-side date filter that
//! silently ignores an out-of-range request can otherwise look identical
//! to "there is nothing new".

use std::time::Duration;

use blacklist_core_rate_limiter::RateLimiter;
use blacklist_domain_models::RawRecord;
use chrono::{Duration as ChronoDuration, NaiveDate};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use crate::auth::PortalAuthClient;
use crate::errors::PortalError;
use crate::parse::parse_records;

const LIST_TIMEOUT: Duration = Duration::from_secs(45);
const PAGE_SIZE: u32 = 100;
const DATE_FORMAT: &str = "%Y%m%d";

/// One of the four fixed sweep strategies, tried in this order until one
/// returns a non-empty result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStrategy {
    UserSpecified,
    RecentOneDay,
    RecentNinetyDay,
    AllData,
}

/// A date range to request, or `None` for the all-data (no date filter) case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Default page cap for a sweep that doesn't specify one explicitly.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Runs the fixed strategy order, returning the first strategy that
/// produced a record plus its records. `user_range` is only tried when the
/// caller supplied one explicitly. `max_pages` bounds each strategy's page
/// iteration (§4.3, §4.6's 50-page daily/forced cap).
#[instrument(skip(auth, limiter, user_range), fields(base_url = auth.base_url()))]
pub async fn sweep(
    auth: &PortalAuthClient,
    limiter: &RateLimiter,
    today: NaiveDate,
    user_range: Option<DateRange>,
    max_pages: u32,
) -> Result<(SweepStrategy, Vec<RawRecord>), PortalError> {
    let mut candidates = Vec::new();
    if let Some(range) = user_range {
        candidates.push((SweepStrategy::UserSpecified, Some(range)));
    }
    candidates.push((
        SweepStrategy::RecentOneDay,
        Some(DateRange {
            start: today - ChronoDuration::days(1),
            end: today,
        }),
    ));
    candidates.push((
        SweepStrategy::RecentNinetyDay,
        Some(DateRange {
            start: today - ChronoDuration::days(90),
            end: today,
        }),
    ));
    candidates.push((SweepStrategy::AllData, None));

    for (strategy, range) in candidates {
        debug!(?strategy, "trying sweep strategy");
        let records = fetch_all_pages(auth, limiter, range, max_pages).await?;
        if !records.is_empty() {
            return Ok((strategy, records));
        }
    }

    Ok((SweepStrategy::AllData, Vec::new()))
}

/// Pages through `advisoryList` for one date range until a page returns no
/// records, a non-200 status, or `max_pages` is reached. `page` is 0-based
/// on the wire (§6), so the loop starts at 0, not 1.
async fn fetch_all_pages(
    auth: &PortalAuthClient,
    limiter: &RateLimiter,
    range: Option<DateRange>,
    max_pages: u32,
) -> Result<Vec<RawRecord>, PortalError> {
    let mut page = 0u32;
    let mut records = Vec::new();

    while page < max_pages {
        limiter.wait_if_needed().await;

        let response = post_advisory_list(auth, range, page).await;
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                limiter.on_failure(None).await;
                return Err(err.into());
            }
        };

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if PortalAuthClient::is_cookie_expired(status, location.as_deref()) {
            limiter.on_failure(Some(status.as_u16())).await;
            return Err(PortalError::SessionExpired);
        }

        if status != StatusCode::OK {
            limiter.on_failure(Some(status.as_u16())).await;
            warn!(%status, page, "advisory list page returned non-200, stopping sweep");
            return Err(PortalError::UnexpectedStatus(status.as_u16()));
        }
        limiter.on_success().await;

        let body = response.text().await?;
        let page_records = parse_records(&body);
        if page_records.is_empty() {
            break;
        }

        let fetched = page_records.len() as u32;
        records.extend(page_records);
        page += 1;
        if fetched < PAGE_SIZE {
            break;
        }
    }

    Ok(records)
}

async fn post_advisory_list(
    auth: &PortalAuthClient,
    range: Option<DateRange>,
    page: u32,
) -> Result<reqwest::Response, reqwest::Error> {
    let url = format!("{}/fcti/securityAdvisory/advisoryList", auth.base_url());
    let mut form: Vec<(&str, String)> = vec![
        ("page", page.to_string()),
        ("pageSize", PAGE_SIZE.to_string()),
        ("size", PAGE_SIZE.to_string()),
        ("tabSort", "blacklist".to_string()),
        ("findCondition", "all".to_string()),
        ("excelDown", "blacklist".to_string()),
        ("cveId", String::new()),
        ("ipId", String::new()),
        ("estId", String::new()),
        ("findKeyword", String::new()),
    ];
    if let Some(range) = range {
        form.push(("startDate", range.start.format(DATE_FORMAT).to_string()));
        form.push(("endDate", range.end.format(DATE_FORMAT).to_string()));
    }

    auth.http_client()
        .post(&url)
        .header("Accept", "application/json, text/html;q=0.9, */*;q=0.8")
        .header("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7")
        .header("Referer", &url)
        .header("Origin", auth.base_url())
        .header("X-Requested-With", "XMLHttpRequest")
        .timeout(LIST_TIMEOUT)
        .form(&form)
        .send()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_order_tries_user_specified_first() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let user_range = Some(DateRange {
            start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: today,
        });
        assert!(user_range.is_some());
    }

    #[test]
    fn date_range_spans_expected_windows() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let one_day = today - ChronoDuration::days(1);
        let ninety_day = today - ChronoDuration::days(90);
        assert_eq!((today - one_day).num_days(), 1);
        assert_eq!((today - ninety_day).num_days(), 90);
    }
}
