use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode};

use podium_types::api::Claims;

use crate::error::ApiError;
use crate::{AppState, blocking};

/// Extractor that requires authentication: a valid bearer token whose
/// session has not been revoked by sign-out. Returns 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims =
            claims_from_headers(&parts.headers, &state.jwt_secret).ok_or(ApiError::Unauthorized)?;

        if !session_is_live(state, &claims).await? {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser(claims))
    }
}

/// Optional variant: anonymous requests yield `None` instead of 401. Used by
/// the public ranking views, where authentication only widens what is
/// visible.
pub struct MaybeUser(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(AuthUser(claims)) => Ok(MaybeUser(Some(claims))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

fn claims_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

async fn session_is_live(state: &AppState, claims: &Claims) -> Result<bool, ApiError> {
    let db = state.db.clone();
    let jti = claims.jti.to_string();
    blocking(move || db.session_exists(&jti)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    fn token(secret: &str) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@example.com".into(),
            jti: Uuid::new_v4(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn missing_or_malformed_headers_yield_no_claims() {
        assert!(claims_from_headers(&HeaderMap::new(), "secret").is_none());
        assert!(claims_from_headers(&bearer("garbage"), "secret").is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = token("secret");
        assert!(claims_from_headers(&bearer(&token), "other-secret").is_none());
        assert!(claims_from_headers(&bearer(&token), "secret").is_some());
    }
}
