use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use podium_types::api::{
    Claims, CurrentSessionResponse, LinkRequest, LinkResponse, LoginRequest, RedeemLinkRequest,
    RegisterRequest, RegisterResponse, SessionResponse, SignOutRequest, SignOutScope,
    UpdatePasswordRequest,
};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::{AppState, blocking};

/// Email-link tokens stay redeemable for 15 minutes.
const LINK_TOKEN_TTL_SECS: i64 = 15 * 60;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;

    let existing = {
        let db = state.db.clone();
        let email = email.clone();
        blocking(move || db.get_user_by_email(&email)).await?
    };
    if existing.is_some() {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    {
        let db = state.db.clone();
        let id = user_id.to_string();
        let email = email.clone();
        blocking(move || db.create_user(&id, &email, Some(&password_hash))).await?;
    }

    let token = issue_session(&state, user_id, &email).await?;
    info!("Registered {} ({})", email, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;

    let user = {
        let db = state.db.clone();
        let email = email.clone();
        blocking(move || db.get_user_by_email(&email)).await?
    }
    .ok_or(ApiError::Unauthorized)?;

    // Accounts created through the email link have no password yet.
    let stored_hash = user.password.as_deref().ok_or(ApiError::Unauthorized)?;
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;

    let token = issue_session(&state, user_id, &email).await?;
    Ok(Json(SessionResponse {
        user_id,
        email,
        token,
    }))
}

/// Issue a one-time email-link token, creating the account when the address
/// is new. Delivering the token by mail is outside this service; the caller
/// gets it back in the response.
pub async fn request_link(
    State(state): State<AppState>,
    Json(req): Json<LinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;

    let user_id = {
        let db = state.db.clone();
        let email = email.clone();
        blocking(move || {
            if let Some(user) = db.get_user_by_email(&email)? {
                return Ok(user.id);
            }
            let id = Uuid::new_v4().to_string();
            db.create_user(&id, &email, None)?;
            Ok(id)
        })
        .await?
    };

    let token = Uuid::new_v4();
    let expires_at = chrono::Utc::now().timestamp() + LINK_TOKEN_TTL_SECS;
    {
        let db = state.db.clone();
        let token = token.to_string();
        blocking(move || db.create_login_token(&token, &user_id, expires_at)).await?;
    }

    info!("Issued login link for {}", email);
    Ok(Json(LinkResponse { token }))
}

pub async fn redeem_link(
    State(state): State<AppState>,
    Json(req): Json<RedeemLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let user_id = {
        let db = state.db.clone();
        let token = req.token.to_string();
        blocking(move || db.redeem_login_token(&token, now)).await?
    }
    .ok_or(ApiError::Unauthorized)?;

    let user = {
        let db = state.db.clone();
        let id = user_id.clone();
        blocking(move || db.get_user_by_id(&id)).await?
    }
    .ok_or(ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;

    let token = issue_session(&state, user_id, &user.email).await?;
    Ok(Json(SessionResponse {
        user_id,
        email: user.email,
        token,
    }))
}

pub async fn current_session(AuthUser(claims): AuthUser) -> Json<CurrentSessionResponse> {
    Json(CurrentSessionResponse {
        user_id: claims.sub,
        email: claims.email,
    })
}

pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let updated = {
        let db = state.db.clone();
        let id = claims.sub.to_string();
        blocking(move || db.set_user_password(&id, &password_hash)).await?
    };
    if !updated {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Sign out. `local` revokes the presenting session, `all` revokes every
/// session of the user. A session that is already gone counts as signed out.
pub async fn sign_out(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<SignOutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    match req.scope {
        SignOutScope::Local => {
            let jti = claims.jti.to_string();
            blocking(move || db.delete_session(&jti).map(|_| ())).await?;
        }
        SignOutScope::All => {
            let user_id = claims.sub.to_string();
            blocking(move || db.delete_user_sessions(&user_id).map(|_| ())).await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn issue_session(state: &AppState, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let jti = Uuid::new_v4();
    {
        let db = state.db.clone();
        let jti = jti.to_string();
        let uid = user_id.to_string();
        blocking(move || db.create_session(&jti, &uid)).await?;
    }
    create_token(&state.jwt_secret, user_id, email, jti)
        .map_err(ApiError::Internal)
}

fn create_token(secret: &str, user_id: Uuid, email: &str, jti: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        jti,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {e}")))
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.len() < 3 || !email.contains('@') {
        return Err(ApiError::Validation("a valid email address is required".into()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  User@Example.COM ").unwrap(),
            "user@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("").is_err());
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn token_roundtrip_carries_claims() {
        let user_id = Uuid::new_v4();
        let jti = Uuid::new_v4();
        let token = create_token("secret", user_id, "a@example.com", jti).unwrap();

        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert_eq!(data.claims.jti, jti);
        assert_eq!(data.claims.email, "a@example.com");
    }
}
