use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::auth::{
        Claims, LoginRequest, LoginResponse, PasswordResetConfirm, PasswordResetRequest,
        SignupRequest, TwoFaEnabled, VerifyEmailRequest,
    },
    entity::users::{self, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_USER},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const OTP_TTL_MINUTES: i64 = 15;
const TOKEN_TTL_HOURS: i64 = 48;

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Six digits, single use, persisted on the user row with an expiry so it
/// survives restarts and works across instances.
fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

fn issue_token(user: &users::Model) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(token)
}

pub async fn signup(state: &AppState, payload: SignupRequest) -> AppResult<ApiResponse<User>> {
    let SignupRequest {
        username,
        email,
        password,
    } = payload;

    if username.trim().is_empty() || email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "username and email are required".to_string(),
        ));
    }
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;
    let exists = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Username.eq(username.clone()))
                .add(UserCol::Email.eq(email.clone())),
        )
        .one(&txn)
        .await?;
    if exists.is_some() {
        return Err(AppError::BadRequest(
            "Username or email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&password)?;
    let code = generate_otp();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        role: Set(ROLE_USER.to_string()),
        is_verified: Set(false),
        verification_code: Set(Some(code.clone())),
        verification_expires_at: Set(Some(
            (Utc::now() + Duration::minutes(OTP_TTL_MINUTES)).into(),
        )),
        reset_code: Set(None),
        reset_expires_at: Set(None),
        two_fa_secret: Set(None),
        two_fa_enabled: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Delivery failure rolls the signup back; a user row without a
    // deliverable verification code is useless.
    if let Err(err) = state
        .mailer
        .send(
            &email,
            "Verify your account",
            &format!("Your verification code is {code}. It expires in {OTP_TTL_MINUTES} minutes."),
        )
        .await
    {
        txn.rollback().await?;
        return Err(AppError::ExternalService(format!(
            "failed to send verification email: {err}"
        )));
    }
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_signup",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created. Check your email for a verification code.",
        User::from(user),
        None,
    ))
}

pub async fn verify_email(
    state: &AppState,
    payload: VerifyEmailRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.clone()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if user.is_verified {
        return Ok(ApiResponse::success(
            "User already verified",
            serde_json::json!({}),
            Some(Meta::empty()),
        ));
    }

    let valid = user.verification_code.as_deref() == Some(payload.code.as_str())
        && user
            .verification_expires_at
            .is_some_and(|expires| expires > Utc::now());
    if !valid {
        return Err(AppError::BadRequest(
            "Invalid or expired verification code".to_string(),
        ));
    }

    let mut active: users::ActiveModel = user.into();
    active.is_verified = Set(true);
    active.verification_code = Set(None);
    active.verification_expires_at = Set(None);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Email verified successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;

    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.is_verified {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&user)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {token}"),
        },
        Some(Meta::empty()),
    ))
}

/// Always answers 200 so the endpoint cannot be used to probe which
/// addresses have accounts.
pub async fn request_password_reset(
    state: &AppState,
    payload: PasswordResetRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.clone()))
        .one(&state.orm)
        .await?;

    if let Some(user) = user {
        let code = generate_otp();
        let email = user.email.clone();

        let txn = state.orm.begin().await?;
        let mut active: users::ActiveModel = user.into();
        active.reset_code = Set(Some(code.clone()));
        active.reset_expires_at = Set(Some(
            (Utc::now() + Duration::minutes(OTP_TTL_MINUTES)).into(),
        ));
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;

        if let Err(err) = state
            .mailer
            .send(
                &email,
                "Password reset",
                &format!(
                    "Your password reset code is {code}. It expires in {OTP_TTL_MINUTES} minutes."
                ),
            )
            .await
        {
            txn.rollback().await?;
            return Err(AppError::ExternalService(format!(
                "failed to send password reset email: {err}"
            )));
        }
        txn.commit().await?;
    }

    Ok(ApiResponse::success(
        "If that account exists, a reset code has been sent",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn confirm_password_reset(
    state: &AppState,
    payload: PasswordResetConfirm,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.clone()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let valid = user.reset_code.as_deref() == Some(payload.code.as_str())
        && user
            .reset_expires_at
            .is_some_and(|expires| expires > Utc::now());
    if !valid {
        return Err(AppError::BadRequest(
            "Invalid or expired reset code".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.new_password)?;
    let user_id = user.id;

    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(password_hash);
    active.reset_code = Set(None);
    active.reset_expires_at = Set(None);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "password_reset",
        Some("users"),
        Some(serde_json::json!({ "user_id": user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Issues and stores a fresh shared secret. Verifying codes at login is the
/// authenticator app's side of the contract and out of scope here.
pub async fn enable_two_fa(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<TwoFaEnabled>> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let mut active: users::ActiveModel = existing.into();
    active.two_fa_secret = Set(Some(secret.clone()));
    active.two_fa_enabled = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Two-factor authentication enabled",
        TwoFaEnabled { secret },
        Some(Meta::empty()),
    ))
}

pub async fn disable_two_fa(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: users::ActiveModel = existing.into();
    active.two_fa_secret = Set(None);
    active.two_fa_enabled = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Two-factor authentication disabled",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
