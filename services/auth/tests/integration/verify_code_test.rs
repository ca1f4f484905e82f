use chrono::Duration;

use bazaar_auth::error::AuthServiceError;
use bazaar_auth::usecase::send_code::SendCodeInput;
use bazaar_auth::usecase::verify_code::VerifyCodeInput;
use bazaar_domain::user::UserRole;

use crate::helpers::{Harness, MemoryStore, TEST_CODE, TEST_PHONE, device, test_user};

async fn send(h: &Harness) {
    h.send_code()
        .execute(SendCodeInput {
            phone: TEST_PHONE.to_owned(),
            origin: None,
            locale: None,
        })
        .await
        .unwrap();
}

fn attempt(code: &str) -> VerifyCodeInput {
    VerifyCodeInput {
        phone: "0501234567".to_owned(),
        code: code.to_owned(),
        device: device("pixel-8"),
        first_name: Some("Ivan".to_owned()),
        last_name: None,
    }
}

#[tokio::test]
async fn should_register_new_user_on_first_verification() {
    let h = Harness::new();
    send(&h).await;

    let out = h.verify_code().execute(attempt(TEST_CODE)).await.unwrap();

    assert_eq!(out.user.phone.as_deref(), Some(TEST_PHONE));
    assert_eq!(out.user.first_name.as_deref(), Some("Ivan"));
    assert_eq!(out.user.role, UserRole::Client);
    assert!(out.user.is_verified);
    assert_eq!(out.tokens.token_type, "Bearer");

    let tables = h.store.tables();
    assert_eq!(tables.users.len(), 1);
    assert_eq!(tables.users[0].id, out.user.id);
    assert!(tables.codes[0].is_used);
    assert_eq!(tables.refresh_tokens.len(), 1);
    assert_eq!(tables.sessions.len(), 1);
    assert_eq!(
        tables.refresh_tokens[0].device.device_id.as_deref(),
        Some("pixel-8")
    );
}

#[tokio::test]
async fn should_log_in_existing_user_without_name() {
    let mut user = test_user(TEST_PHONE);
    user.is_verified = false;
    let h = Harness::with_store(MemoryStore::with_users(vec![user.clone()]));
    send(&h).await;

    let out = h
        .verify_code()
        .execute(VerifyCodeInput {
            first_name: None,
            ..attempt(TEST_CODE)
        })
        .await
        .unwrap();

    assert_eq!(out.user.id, user.id);
    assert!(out.user.is_verified);
    assert!(out.user.last_login_at.is_some());
    let tables = h.store.tables();
    assert_eq!(tables.users.len(), 1);
    assert!(tables.users[0].is_verified);
}

#[tokio::test]
async fn should_require_first_name_for_unknown_phone() {
    let h = Harness::new();
    send(&h).await;

    let result = h
        .verify_code()
        .execute(VerifyCodeInput {
            first_name: Some("   ".to_owned()),
            ..attempt(TEST_CODE)
        })
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
    // The code was consumed before the account lookup.
    assert!(h.store.tables().codes[0].is_used);
}

#[tokio::test]
async fn should_reject_reuse_of_consumed_code() {
    let h = Harness::new();
    send(&h).await;

    h.verify_code().execute(attempt(TEST_CODE)).await.unwrap();
    let result = h.verify_code().execute(attempt(TEST_CODE)).await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOrExpiredCode)),
        "expected InvalidOrExpiredCode, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_without_any_code() {
    let h = Harness::new();

    let result = h.verify_code().execute(attempt(TEST_CODE)).await;
    assert!(matches!(result, Err(AuthServiceError::InvalidOrExpiredCode)));
}

#[tokio::test]
async fn should_reject_expired_code() {
    let h = Harness::new();
    send(&h).await;

    h.clock.advance(Duration::minutes(5));

    let result = h.verify_code().execute(attempt(TEST_CODE)).await;
    assert!(matches!(result, Err(AuthServiceError::InvalidOrExpiredCode)));
}

#[tokio::test]
async fn should_count_wrong_guesses_and_lock_after_max_attempts() {
    let h = Harness::new();
    send(&h).await;

    for n in 1..=3 {
        let result = h.verify_code().execute(attempt("0000")).await;
        assert!(
            matches!(result, Err(AuthServiceError::InvalidOrExpiredCode)),
            "attempt {n}: expected InvalidOrExpiredCode, got {result:?}"
        );
        assert_eq!(h.store.tables().codes[0].attempts, n);
    }

    // Fourth call is refused even with the right code.
    let result = h.verify_code().execute(attempt(TEST_CODE)).await;
    assert!(
        matches!(result, Err(AuthServiceError::MaxAttemptsReached)),
        "expected MaxAttemptsReached, got {result:?}"
    );
    assert!(h.store.tables().users.is_empty());
}

#[tokio::test]
async fn should_accept_correct_code_after_some_wrong_guesses() {
    let h = Harness::new();
    send(&h).await;

    for _ in 0..2 {
        let _ = h.verify_code().execute(attempt("9999")).await;
    }
    let out = h.verify_code().execute(attempt(TEST_CODE)).await;

    assert!(out.is_ok(), "{out:?}");
    assert_eq!(h.store.tables().codes[0].attempts, 3);
}

#[tokio::test]
async fn should_only_accept_latest_code() {
    let h = Harness::new();
    send(&h).await;
    *h.secrets.code.lock().unwrap() = "5555".to_owned();
    send(&h).await;

    let stale = h.verify_code().execute(attempt(TEST_CODE)).await;
    assert!(matches!(stale, Err(AuthServiceError::InvalidOrExpiredCode)));

    let fresh = h.verify_code().execute(attempt("5555")).await;
    assert!(fresh.is_ok(), "{fresh:?}");
}

#[tokio::test]
async fn should_let_only_one_concurrent_verification_win() {
    let h = Harness::new();
    send(&h).await;

    let first = h.verify_code();
    let second = h.verify_code();
    let (a, b) = tokio::join!(
        first.execute(attempt(TEST_CODE)),
        second.execute(attempt(TEST_CODE))
    );

    let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1, "exactly one verification may succeed");
    assert_eq!(h.store.tables().sessions.len(), 1);
}

#[tokio::test]
async fn should_reject_blocked_user_after_consuming_code() {
    let mut user = test_user(TEST_PHONE);
    user.is_blocked = true;
    let h = Harness::with_store(MemoryStore::with_users(vec![user]));
    send(&h).await;

    let result = h.verify_code().execute(attempt(TEST_CODE)).await;

    assert!(
        matches!(result, Err(AuthServiceError::AccountBlocked)),
        "expected AccountBlocked, got {result:?}"
    );
    let tables = h.store.tables();
    assert!(tables.codes[0].is_used);
    assert!(tables.sessions.is_empty());
}

#[tokio::test]
async fn should_cap_attempts_under_concurrent_wrong_guesses() {
    let h = Harness::new();
    send(&h).await;

    let verifiers: Vec<_> = (0..6).map(|_| h.verify_code()).collect();
    let (a, b, c, d, e, f) = tokio::join!(
        verifiers[0].execute(attempt("0000")),
        verifiers[1].execute(attempt("0001")),
        verifiers[2].execute(attempt("0002")),
        verifiers[3].execute(attempt("0003")),
        verifiers[4].execute(attempt("0004")),
        verifiers[5].execute(attempt("0005")),
    );
    let results = [a, b, c, d, e, f];

    let wrong = results
        .iter()
        .filter(|r| matches!(r, Err(AuthServiceError::InvalidOrExpiredCode)))
        .count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(AuthServiceError::MaxAttemptsReached)))
        .count();
    assert_eq!(wrong, h.otp.max_attempts as usize);
    assert_eq!(exhausted, 6 - h.otp.max_attempts as usize);
    assert_eq!(h.store.tables().codes[0].attempts, h.otp.max_attempts);

    let late = h.verify_code().execute(attempt(TEST_CODE)).await;
    assert!(
        matches!(late, Err(AuthServiceError::MaxAttemptsReached)),
        "expected MaxAttemptsReached, got {late:?}"
    );
}

#[tokio::test]
async fn should_reject_truncated_phone_without_panicking() {
    let h = Harness::new();
    send(&h).await;

    for phone in ["38012", "+380123", "+3801234", ""] {
        let result = h
            .verify_code()
            .execute(VerifyCodeInput {
                phone: phone.to_owned(),
                ..attempt(TEST_CODE)
            })
            .await;
        assert!(
            matches!(result, Err(AuthServiceError::InvalidOrExpiredCode)),
            "phone {phone:?}: expected InvalidOrExpiredCode, got {result:?}"
        );
    }
    assert!(!h.store.tables().codes[0].is_used);
}
