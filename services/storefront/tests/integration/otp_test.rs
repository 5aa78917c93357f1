use std::time::Duration;

use storefront::domain::notification::{DeliveryChannel, Notification};
use storefront::error::StorefrontError;
use storefront_domain::identifier::Identifier;

use crate::helpers::{MemStore, MockQueue, email, otp_machine};

#[tokio::test]
async fn should_issue_code_and_enqueue_delivery() {
    let store = MemStore::new();
    let queue = MockQueue::new();
    let otp = otp_machine(store.clone(), queue.clone());
    let id = email("ada@example.com");

    let issued = otp.issue(&id).await.unwrap();
    assert_eq!(issued.channel, DeliveryChannel::Email);
    assert_eq!(issued.expires_in_secs, 300);

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1, "expected exactly one delivery job");
    let code = queue.last_code().unwrap();
    assert_eq!(code.len(), 6);
    assert_eq!(store.raw("otp:email:ada@example.com"), Some(code));
    assert!(matches!(
        &jobs[0].notification,
        Notification::OtpDelivery { recipient, .. } if *recipient == id
    ));
}

#[tokio::test]
async fn should_route_phone_codes_whatsapp_first() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id: Identifier = "+1 555 010 2030".parse().unwrap();

    let issued = otp.issue(&id).await.unwrap();
    assert_eq!(issued.channel, DeliveryChannel::WhatsApp);
    match &queue.jobs()[0].notification {
        Notification::OtpDelivery { channels, .. } => {
            assert_eq!(channels, &[DeliveryChannel::WhatsApp, DeliveryChannel::Sms]);
        }
        other => panic!("expected OtpDelivery, got {other:?}"),
    }
}

#[tokio::test]
async fn should_keep_only_latest_code_live() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let first = queue.last_code().unwrap();
    otp.issue(&id).await.unwrap();
    let second = queue.last_code().unwrap();

    if first != second {
        let result = otp.verify(&id, &first).await;
        assert!(
            matches!(result, Err(StorefrontError::InvalidOtp { .. })),
            "expected InvalidOtp for superseded code, got {result:?}"
        );
    }
    otp.verify(&id, &second).await.unwrap();
}

#[tokio::test]
async fn should_accept_code_only_once() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let code = queue.last_code().unwrap();

    otp.verify(&id, &code).await.unwrap();
    let result = otp.verify(&id, &code).await;
    assert!(
        matches!(result, Err(StorefrontError::InvalidOrExpiredOtp)),
        "expected InvalidOrExpiredOtp on reuse, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_remaining_attempts() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let wrong = wrong_code(&queue.last_code().unwrap());

    let first = otp.verify(&id, &wrong).await;
    assert!(
        matches!(first, Err(StorefrontError::InvalidOtp { remaining_attempts: 2 })),
        "got {first:?}"
    );
    let second = otp.verify(&id, &wrong).await;
    assert!(
        matches!(second, Err(StorefrontError::InvalidOtp { remaining_attempts: 1 })),
        "got {second:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn should_cool_down_after_three_failures_then_recover() {
    let store = MemStore::new();
    let queue = MockQueue::new();
    let otp = otp_machine(store.clone(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let code = queue.last_code().unwrap();
    let wrong = wrong_code(&code);

    let _ = otp.verify(&id, &wrong).await;
    let _ = otp.verify(&id, &wrong).await;
    let third = otp.verify(&id, &wrong).await;
    assert!(
        matches!(third, Err(StorefrontError::RateLimited { retry_after_secs: 60 })),
        "expected RateLimited on third failure, got {third:?}"
    );

    // Even the right code is refused while cooling down.
    tokio::time::advance(Duration::from_secs(30)).await;
    let gated = otp.verify(&id, &code).await;
    assert!(
        matches!(gated, Err(StorefrontError::RateLimited { retry_after_secs: 30 })),
        "expected RateLimited with remaining window, got {gated:?}"
    );
    let reissue = otp.issue(&id).await;
    assert!(
        matches!(reissue, Err(StorefrontError::RateLimited { .. })),
        "expected issuance blocked during cooldown, got {reissue:?}"
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    otp.verify(&id, &code).await.unwrap();
    assert!(store.keys().is_empty(), "left keys: {:?}", store.keys());
}

#[tokio::test(start_paused = true)]
async fn should_expire_code_after_ttl() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let code = queue.last_code().unwrap();

    tokio::time::advance(Duration::from_secs(301)).await;
    let result = otp.verify(&id, &code).await;
    assert!(
        matches!(result, Err(StorefrontError::InvalidOrExpiredOtp)),
        "expected InvalidOrExpiredOtp after expiry, got {result:?}"
    );
}

#[tokio::test]
async fn should_count_failures_without_live_code() {
    let otp = otp_machine(MemStore::new(), MockQueue::new());
    let id = email("ghost@example.com");

    let _ = otp.verify(&id, "000000").await;
    let _ = otp.verify(&id, "000000").await;
    let third = otp.verify(&id, "000000").await;
    assert!(
        matches!(third, Err(StorefrontError::RateLimited { .. })),
        "expected RateLimited, got {third:?}"
    );
}

#[tokio::test]
async fn should_reset_attempts_on_reissue() {
    let queue = MockQueue::new();
    let otp = otp_machine(MemStore::new(), queue.clone());
    let id = email("ada@example.com");

    otp.issue(&id).await.unwrap();
    let wrong = wrong_code(&queue.last_code().unwrap());
    let _ = otp.verify(&id, &wrong).await;
    let _ = otp.verify(&id, &wrong).await;

    otp.issue(&id).await.unwrap();
    let wrong = wrong_code(&queue.last_code().unwrap());
    let result = otp.verify(&id, &wrong).await;
    assert!(
        matches!(result, Err(StorefrontError::InvalidOtp { remaining_attempts: 2 })),
        "expected fresh attempt budget, got {result:?}"
    );
}

#[tokio::test]
async fn should_fail_issue_when_queue_unavailable() {
    let otp = otp_machine(MemStore::new(), MockQueue::failing());
    let result = otp.issue(&email("ada@example.com")).await;
    assert!(
        matches!(result, Err(StorefrontError::Internal(_))),
        "expected Internal, got {result:?}"
    );
}

fn wrong_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_owned()
    } else {
        "000000".to_owned()
    }
}
