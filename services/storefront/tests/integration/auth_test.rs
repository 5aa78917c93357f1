use storefront::domain::notification::Notification;
use storefront::error::StorefrontError;
use storefront::usecase::auth::{
    OtpLoginInput, OtpLoginUseCase, PasswordLoginInput, PasswordLoginUseCase, RegisterInput,
    RegisterUseCase, RequestOtpUseCase,
};
use storefront::usecase::token::verify_password;
use storefront_auth_types::token::validate_access_token;
use storefront_domain::identifier::Identifier;
use storefront_domain::user::UserRole;
use storefront_testing::auth::TEST_JWT_SECRET;

use crate::helpers::{
    MemDb, MemStore, MockQueue, TEST_PASSWORD, email, otp_machine, password_user, phone_user,
    test_user, token_issuer,
};

// ── Password login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_issue_token_for_correct_password() {
    let user = password_user("ada@example.com");
    let uc = PasswordLoginUseCase {
        users: MemDb::with_users(vec![user.clone()]),
        tokens: token_issuer(),
    };

    let output = uc
        .execute(PasswordLoginInput {
            identifier: email("ADA@example.com"),
            password: TEST_PASSWORD.to_owned(),
        })
        .await
        .unwrap();

    assert_eq!(output.user.id, user.id);
    let info = validate_access_token(&output.token.access_token, TEST_JWT_SECRET).unwrap();
    assert_eq!(info.user_id, user.id);
    assert_eq!(info.role, UserRole::Customer);
}

#[tokio::test]
async fn should_reject_wrong_password_and_unknown_user_alike() {
    let user = password_user("ada@example.com");
    let uc = PasswordLoginUseCase {
        users: MemDb::with_users(vec![user]),
        tokens: token_issuer(),
    };

    let wrong = uc
        .execute(PasswordLoginInput {
            identifier: email("ada@example.com"),
            password: "not-the-password".to_owned(),
        })
        .await;
    assert!(
        matches!(wrong, Err(StorefrontError::InvalidCredentials)),
        "expected InvalidCredentials, got {wrong:?}"
    );

    let unknown = uc
        .execute(PasswordLoginInput {
            identifier: email("nobody@example.com"),
            password: TEST_PASSWORD.to_owned(),
        })
        .await;
    assert!(
        matches!(unknown, Err(StorefrontError::InvalidCredentials)),
        "expected InvalidCredentials, got {unknown:?}"
    );
}

#[tokio::test]
async fn should_reject_password_login_for_otp_only_account() {
    let uc = PasswordLoginUseCase {
        users: MemDb::with_users(vec![test_user("otp@example.com")]),
        tokens: token_issuer(),
    };
    let result = uc
        .execute(PasswordLoginInput {
            identifier: email("otp@example.com"),
            password: TEST_PASSWORD.to_owned(),
        })
        .await;
    assert!(
        matches!(result, Err(StorefrontError::InvalidCredentials)),
        "expected InvalidCredentials, got {result:?}"
    );
}

// ── OTP request + login ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_return_not_found_when_requesting_otp_for_unknown_identifier() {
    let queue = MockQueue::new();
    let uc = RequestOtpUseCase {
        users: MemDb::new(),
        otp: otp_machine(MemStore::new(), queue.clone()),
    };

    let result = uc.execute(&email("nobody@example.com")).await;
    assert!(
        matches!(result, Err(StorefrontError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
    assert!(queue.jobs().is_empty(), "no code should be sent");
}

#[tokio::test]
async fn should_log_in_once_with_requested_code() {
    let user = phone_user("+15550102030");
    let db = MemDb::with_users(vec![user.clone()]);
    let store = MemStore::new();
    let queue = MockQueue::new();
    let identifier: Identifier = "+1 (555) 010-2030".parse().unwrap();

    let request = RequestOtpUseCase {
        users: db.clone(),
        otp: otp_machine(store.clone(), queue.clone()),
    };
    request.execute(&identifier).await.unwrap();
    let code = queue.last_code().unwrap();

    let login = OtpLoginUseCase {
        users: db.clone(),
        otp: otp_machine(store.clone(), queue.clone()),
        tokens: token_issuer(),
    };
    let output = login
        .execute(OtpLoginInput {
            identifier: identifier.clone(),
            code: code.clone(),
        })
        .await
        .unwrap();
    assert_eq!(output.user.id, user.id);
    let info = validate_access_token(&output.token.access_token, TEST_JWT_SECRET).unwrap();
    assert_eq!(info.identifier, "+15550102030");

    let replay = login
        .execute(OtpLoginInput { identifier, code })
        .await;
    assert!(
        matches!(replay, Err(StorefrontError::InvalidOrExpiredOtp)),
        "expected InvalidOrExpiredOtp on replay, got {replay:?}"
    );
}

#[tokio::test]
async fn should_not_count_attempts_for_unknown_identifier() {
    let store = MemStore::new();
    let login = OtpLoginUseCase {
        users: MemDb::new(),
        otp: otp_machine(store.clone(), MockQueue::new()),
        tokens: token_issuer(),
    };

    for _ in 0..5 {
        let result = login
            .execute(OtpLoginInput {
                identifier: email("nobody@example.com"),
                code: "123456".to_owned(),
            })
            .await;
        assert!(
            matches!(result, Err(StorefrontError::InvalidCredentials)),
            "expected InvalidCredentials, got {result:?}"
        );
    }
    assert!(store.keys().is_empty());
}

// ── Register ─────────────────────────────────────────────────────────────────

fn register_input(email_addr: Option<&str>, phone: Option<&str>) -> RegisterInput {
    RegisterInput {
        name: "  Ada Lovelace ".to_owned(),
        email: email_addr.map(email),
        phone: phone.map(|p| p.parse().unwrap()),
        password: None,
    }
}

#[tokio::test]
async fn should_register_customer_and_enqueue_welcome() {
    let db = MemDb::new();
    let queue = MockQueue::new();
    let uc = RegisterUseCase {
        users: db.clone(),
        queue: queue.clone(),
    };

    let mut input = register_input(Some("ada@example.com"), Some("+15550102030"));
    input.password = Some("s3cret-pass".to_owned());
    let user = uc.execute(input).await.unwrap();

    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.role, UserRole::Customer);
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    let hash = user.password_hash.as_deref().unwrap();
    assert!(verify_password("s3cret-pass", hash));
    assert_eq!(db.users().len(), 1);

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].idempotency_key, format!("welcome:{}", user.id));
    assert!(matches!(
        &jobs[0].notification,
        Notification::Welcome { recipient: Identifier::Email(e), .. } if e == "ada@example.com"
    ));
}

#[tokio::test]
async fn should_reject_duplicate_email_or_phone() {
    let mut existing = test_user("ada@example.com");
    existing.phone = Some("+15550102030".to_owned());
    let uc = RegisterUseCase {
        users: MemDb::with_users(vec![existing]),
        queue: MockQueue::new(),
    };

    let by_email = uc
        .execute(register_input(Some("ada@example.com"), None))
        .await;
    assert!(
        matches!(by_email, Err(StorefrontError::UserAlreadyExists)),
        "expected UserAlreadyExists, got {by_email:?}"
    );
    let by_phone = uc
        .execute(register_input(Some("new@example.com"), Some("+15550102030")))
        .await;
    assert!(
        matches!(by_phone, Err(StorefrontError::UserAlreadyExists)),
        "expected UserAlreadyExists, got {by_phone:?}"
    );
}

#[tokio::test]
async fn should_require_contact_and_name_and_password_length() {
    let uc = RegisterUseCase {
        users: MemDb::new(),
        queue: MockQueue::new(),
    };

    let no_contact = uc.execute(register_input(None, None)).await;
    assert!(matches!(no_contact, Err(StorefrontError::InvalidInput(_))), "got {no_contact:?}");

    let mut blank = register_input(Some("a@example.com"), None);
    blank.name = "   ".to_owned();
    let blank = uc.execute(blank).await;
    assert!(matches!(blank, Err(StorefrontError::InvalidInput(_))), "got {blank:?}");

    let mut short = register_input(Some("a@example.com"), None);
    short.password = Some("12345".to_owned());
    let short = uc.execute(short).await;
    assert!(matches!(short, Err(StorefrontError::InvalidInput(_))), "got {short:?}");
}

#[tokio::test]
async fn should_register_even_when_welcome_enqueue_fails() {
    let db = MemDb::new();
    let uc = RegisterUseCase {
        users: db.clone(),
        queue: MockQueue::failing(),
    };
    uc.execute(register_input(Some("ada@example.com"), None))
        .await
        .unwrap();
    assert_eq!(db.users().len(), 1);
}
