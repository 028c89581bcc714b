mod common;

use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use vetcare_api::{
    dto::auth::{
        LoginRequest, PasswordResetConfirm, PasswordResetRequest, SignupRequest,
        VerifyEmailRequest,
    },
    entity::users::{Column as UserCol, Entity as Users},
    error::AppError,
    middleware::auth::AuthUser,
    services::auth_service,
    state::AppState,
};

use common::{FailingMailer, StubMailer, StubProvider, setup_state, test_database_url};

async fn verification_code(state: &AppState, email: &str) -> anyhow::Result<String> {
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?
        .expect("user row");
    Ok(user.verification_code.expect("verification code"))
}

// Integration flow: signup -> verify -> login -> password reset -> 2FA
// toggling, plus mailer-failure rollback.
#[tokio::test]
async fn signup_verification_and_password_reset_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match test_database_url() {
        Some(url) => url,
        None => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    unsafe {
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    }

    let mailer = Arc::new(StubMailer::default());
    let state = setup_state(&database_url, Arc::new(StubProvider::new()), mailer.clone()).await?;

    let signup = auth_service::signup(
        &state,
        SignupRequest {
            username: "frida".into(),
            email: "frida@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(!signup.is_verified);
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);

    // Duplicate username or email is rejected.
    let duplicate = auth_service::signup(
        &state,
        SignupRequest {
            username: "frida".into(),
            email: "frida2@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(_))));

    // Login is blocked until the email is verified.
    let blocked = auth_service::login(
        &state,
        LoginRequest {
            email: "frida@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await;
    assert!(matches!(blocked, Err(AppError::Forbidden)));

    // Wrong code fails, the mailed code succeeds, and the code is single use.
    let wrong = auth_service::verify_email(
        &state,
        VerifyEmailRequest {
            email: "frida@example.com".into(),
            code: "000000".into(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::BadRequest(_))));

    let code = verification_code(&state, "frida@example.com").await?;
    auth_service::verify_email(
        &state,
        VerifyEmailRequest {
            email: "frida@example.com".into(),
            code: code.clone(),
        },
    )
    .await?;
    // Re-verifying an already verified account is a friendly no-op.
    auth_service::verify_email(
        &state,
        VerifyEmailRequest {
            email: "frida@example.com".into(),
            code,
        },
    )
    .await?;

    let login = auth_service::login(
        &state,
        LoginRequest {
            email: "frida@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(login.token.starts_with("Bearer "));

    let bad_password = auth_service::login(
        &state,
        LoginRequest {
            email: "frida@example.com".into(),
            password: "wrong-horse".into(),
        },
    )
    .await;
    assert!(matches!(bad_password, Err(AppError::Unauthorized(_))));

    // Password reset round trip.
    auth_service::request_password_reset(
        &state,
        PasswordResetRequest {
            email: "frida@example.com".into(),
        },
    )
    .await?;
    assert_eq!(mailer.sent.lock().unwrap().len(), 2);

    let user = Users::find()
        .filter(UserCol::Email.eq("frida@example.com"))
        .one(&state.orm)
        .await?
        .expect("user row");
    let reset_code = user.reset_code.expect("reset code");

    auth_service::confirm_password_reset(
        &state,
        PasswordResetConfirm {
            email: "frida@example.com".into(),
            code: reset_code,
            new_password: "battery-staple".into(),
        },
    )
    .await?;

    let stale = auth_service::login(
        &state,
        LoginRequest {
            email: "frida@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await;
    assert!(matches!(stale, Err(AppError::Unauthorized(_))));
    auth_service::login(
        &state,
        LoginRequest {
            email: "frida@example.com".into(),
            password: "battery-staple".into(),
        },
    )
    .await?;

    // Requesting a reset for an unknown address leaks nothing.
    auth_service::request_password_reset(
        &state,
        PasswordResetRequest {
            email: "nobody@example.com".into(),
        },
    )
    .await?;
    assert_eq!(mailer.sent.lock().unwrap().len(), 2);

    // 2FA toggling stores and clears the secret.
    let user = Users::find()
        .filter(UserCol::Email.eq("frida@example.com"))
        .one(&state.orm)
        .await?
        .expect("user row");
    let auth_user = AuthUser {
        user_id: user.id,
        role: user.role.clone(),
    };
    let enabled = auth_service::enable_two_fa(&state, &auth_user).await?.data.unwrap();
    assert_eq!(enabled.secret.len(), 32);
    auth_service::disable_two_fa(&state, &auth_user).await?;
    let user = Users::find_by_id(user.id)
        .one(&state.orm)
        .await?
        .expect("user row");
    assert!(!user.two_fa_enabled);
    assert!(user.two_fa_secret.is_none());

    // Mailer failure rolls the signup back entirely.
    let failing_state = AppState {
        pool: state.pool.clone(),
        orm: state.orm.clone(),
        payments: state.payments.clone(),
        mailer: Arc::new(FailingMailer),
    };
    let failed = auth_service::signup(
        &failing_state,
        SignupRequest {
            username: "ghost".into(),
            email: "ghost@example.com".into(),
            password: "correct-horse".into(),
        },
    )
    .await;
    assert!(matches!(failed, Err(AppError::ExternalService(_))));
    let ghost = Users::find()
        .filter(UserCol::Email.eq("ghost@example.com"))
        .one(&state.orm)
        .await?;
    assert!(ghost.is_none(), "failed signup must not leave a user row");

    Ok(())
}
