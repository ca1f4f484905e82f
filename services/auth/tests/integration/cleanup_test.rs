use chrono::Duration;

use bazaar_auth::domain::port::Clock;
use bazaar_auth::domain::types::CleanupReport;
use bazaar_auth::usecase::send_code::SendCodeInput;

use crate::helpers::{Harness, MemoryStore, TEST_PHONE, device, test_user};

#[tokio::test]
async fn should_remove_only_rows_already_expired() {
    let user = test_user(TEST_PHONE);
    let h = Harness::with_store(MemoryStore::with_users(vec![user.clone()]));

    // Rows created now: code expires in 5 minutes, session in 15, refresh token in 30 days.
    h.send_code()
        .execute(SendCodeInput {
            phone: TEST_PHONE.to_owned(),
            origin: None,
            locale: None,
        })
        .await
        .unwrap();
    h.issuer()
        .issue(&h.store, &user, &device("pixel-8"))
        .await
        .unwrap();

    // Twenty minutes later: code and session are stale, refresh token is not.
    h.clock.advance(Duration::minutes(20));
    h.send_code()
        .execute(SendCodeInput {
            phone: "+380677654321".to_owned(),
            origin: None,
            locale: None,
        })
        .await
        .unwrap();
    h.issuer()
        .issue(&h.store, &user, &device("laptop"))
        .await
        .unwrap();

    let report = h.cleanup().execute().await.unwrap();

    assert_eq!(
        report,
        CleanupReport {
            verification_codes: 1,
            sessions: 1,
            refresh_tokens: 0,
        }
    );
    let now = h.clock.now();
    let tables = h.store.tables();
    assert_eq!(tables.codes.len(), 1);
    assert_eq!(tables.sessions.len(), 1);
    assert_eq!(tables.refresh_tokens.len(), 2);
    assert!(tables.codes.iter().all(|c| c.expires_at >= now));
    assert!(tables.sessions.iter().all(|s| s.expires_at >= now));
}

#[tokio::test]
async fn should_remove_expired_refresh_tokens() {
    let user = test_user(TEST_PHONE);
    let h = Harness::with_store(MemoryStore::with_users(vec![user.clone()]));
    h.issuer()
        .issue(&h.store, &user, &device("pixel-8"))
        .await
        .unwrap();

    h.clock.advance(Duration::days(31));
    let report = h.cleanup().execute().await.unwrap();

    assert_eq!(report.refresh_tokens, 1);
    assert_eq!(report.sessions, 1);
    assert_eq!(report.total(), 2);
    assert!(h.store.tables().refresh_tokens.is_empty());
}

#[tokio::test]
async fn should_report_nothing_on_empty_store() {
    let h = Harness::new();

    let report = h.cleanup().execute().await.unwrap();
    assert_eq!(report, CleanupReport::default());
}
