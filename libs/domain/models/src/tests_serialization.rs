use blacklist_domain_models::*;
use chrono::Utc;
use serde_json::json;

#[test]
fn decision_whitelisted_serializes_without_counts() {
    let decision = Decision::whitelisted();
    let value = serde_json::to_value(&decision).unwrap();
    assert_eq!(value["blocked"], json!(false));
    assert_eq!(value["reason"], json!("whitelist"));
    assert!(value["metadata"].get("detection_count").is_none());
}

#[test]
fn blocked_ip_is_active_now_honors_null_removal_date() {
    let ip = BlockedIp {
        id: 1,
        ip_address: "1.2.3.4".into(),
        source: "REGTECH".into(),
        country: Some("KR".into()),
        reason: "test".into(),
        confidence: 90,
        detection_count: 1,
        detection_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        removal_date: None,
        last_seen: Utc::now(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        raw_payload: json!({}),
    };
    let today = chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    assert!(ip.is_active_now(today));
}

#[test]
fn blocked_ip_is_active_now_flips_false_after_removal_date() {
    let mut ip = BlockedIp {
        id: 1,
        ip_address: "1.2.3.4".into(),
        source: "REGTECH".into(),
        country: None,
        reason: "test".into(),
        confidence: 90,
        detection_count: 1,
        detection_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        removal_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()),
        last_seen: Utc::now(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        raw_payload: json!({}),
    };
    let today = chrono::NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    assert!(!ip.is_active_now(today));

    ip.removal_date = None;
    assert!(ip.is_active_now(today));
}
