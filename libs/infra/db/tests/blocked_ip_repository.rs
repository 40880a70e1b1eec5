use blacklist_domain_models::NormalizedRecord;
use blacklist_infra_db::{BlockedIpRepository, DbClient, WhitelistRepository};
use chrono::NaiveDate;
use serde_json::json;

async fn memory_client() -> DbClient {
    DbClient::connect("file::memory:?cache=shared", None)
        .await
        .expect("in-memory db connects")
}

fn sample_record(ip: &str) -> NormalizedRecord {
    NormalizedRecord {
        ip_address: ip.to_string(),
        source: "REGTECH".to_string(),
        country: Some("KR".to_string()),
        reason: "malware C2".to_string(),
        confidence: 90,
        detection_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        removal_date: None,
        is_active: true,
        raw_payload: json!({"ip_address": ip}),
    }
}

#[tokio::test]
async fn upsert_then_reobservation_increments_detection_count() {
    let client = memory_client().await;
    let repo = BlockedIpRepository::new(client);

    let record = sample_record("1.2.3.4");
    let outcome = repo.upsert_batch(&[record.clone()], "REGTECH").await.unwrap();
    assert_eq!(outcome.new_count, 1);
    assert_eq!(outcome.updated_count, 0);

    let outcome = repo.upsert_batch(&[record], "REGTECH").await.unwrap();
    assert_eq!(outcome.new_count, 0);
    assert_eq!(outcome.updated_count, 1);

    let stored = repo.find_active_by_ip("1.2.3.4").await.unwrap().unwrap();
    assert_eq!(stored.detection_count, 2);
}

#[tokio::test]
async fn active_list_excludes_whitelisted_ips() {
    let client = memory_client().await;
    let blocked_repo = BlockedIpRepository::new(client.clone());
    let whitelist_repo = WhitelistRepository::new(client);

    blocked_repo
        .upsert_batch(&[sample_record("1.2.3.4"), sample_record("5.6.7.8")], "REGTECH")
        .await
        .unwrap();
    whitelist_repo.add("1.2.3.4", None, None, "MANUAL").await.unwrap();

    let active = blocked_repo.list_active_excluding_whitelist().await.unwrap();
    let ips: Vec<_> = active.iter().map(|row| row.ip_address.as_str()).collect();
    assert!(!ips.contains(&"1.2.3.4"));
    assert!(ips.contains(&"5.6.7.8"));
}

#[tokio::test]
async fn expired_removal_date_is_excluded_from_active_view() {
    let client = memory_client().await;
    let repo = BlockedIpRepository::new(client);

    let mut record = sample_record("9.9.9.9");
    record.removal_date = Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    record.is_active = true; // stored flag intentionally stale, per I1's allowed lag

    repo.upsert_batch(&[record], "REGTECH").await.unwrap();

    let active = repo.list_active_excluding_whitelist().await.unwrap();
    assert!(active.iter().all(|row| row.ip_address != "9.9.9.9"));
}
