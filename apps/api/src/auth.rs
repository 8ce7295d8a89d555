//! Session authentication for the dashboard API and bearer-secret
//! authentication for machine callers (intake webhook, analysis queue).
//!
//! Sessions live in Redis under `session:{token}` with a TTL; the token travels
//! in the `hrbuddy_session` HttpOnly cookie.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "hrbuddy_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Email is compared case-insensitively, the password byte-for-byte.
pub fn credentials_match(config_email: &str, config_password: &str, req: &LoginRequest) -> bool {
    let email_ok = constant_time_eq(&req.email.trim().to_lowercase(), &config_email.to_lowercase());
    let password_ok = constant_time_eq(&req.password, config_password);
    email_ok & password_ok
}

/// The token of `Authorization: Bearer <token>`, if present. Taken verbatim.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn session_cookie(token: String, max_age_secs: u64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        ))
        .build()
}

fn end_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

// ─── Session store ───────────────────────────────────────────────────────────

async fn store_session(
    state: &AppState,
    token: &str,
    user: &SessionUser,
) -> Result<(), AppError> {
    let payload = serde_json::to_string(user).map_err(anyhow::Error::from)?;
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    redis::cmd("SET")
        .arg(session_key(token))
        .arg(payload)
        .arg("EX")
        .arg(state.config.session_ttl_secs)
        .query_async::<_, ()>(&mut conn)
        .await?;
    Ok(())
}

async fn load_session(state: &AppState, token: &str) -> Result<Option<SessionUser>, AppError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    let payload: Option<String> = redis::cmd("GET")
        .arg(session_key(token))
        .query_async(&mut conn)
        .await?;
    Ok(payload.and_then(|p| serde_json::from_str(&p).ok()))
}

async fn delete_session(state: &AppState, token: &str) -> Result<(), AppError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    redis::cmd("DEL")
        .arg(session_key(token))
        .query_async::<_, ()>(&mut conn)
        .await?;
    Ok(())
}

/// Cookie first, then a bearer token, for API clients that cannot hold cookies.
async fn current_user(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<SessionUser, AppError> {
    let token = session_token(jar)
        .or_else(|| bearer_token(headers).map(str::to_owned))
        .ok_or(AppError::Unauthorized)?;
    load_session(state, &token).await?.ok_or(AppError::Unauthorized)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    if !credentials_match(&state.config.admin_email, &state.config.admin_password, &req) {
        warn!("Failed login attempt");
        return Err(AppError::Unauthorized);
    }

    let user = SessionUser {
        email: state.config.admin_email.clone(),
        name: "Admin User".to_string(),
        role: "admin".to_string(),
    };
    let token = Uuid::new_v4().simple().to_string();
    store_session(&state, &token, &user).await?;
    info!("Session opened for {}", user.email);

    let jar = jar.add(session_cookie(token, state.config.session_ttl_secs));
    Ok((jar, Json(json!({ "success": true, "user": user }))).into_response())
}

/// POST /api/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&jar) {
        delete_session(&state, &token).await?;
    }
    Ok((end_session(jar), Json(json!({ "success": true }))).into_response())
}

/// GET /api/auth/session
pub async fn handle_session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<SessionUser>, AppError> {
    Ok(Json(current_user(&state, &jar, &headers).await?))
}

// ─── Middleware ──────────────────────────────────────────────────────────────

/// Rejects requests without a live session. The user is made available to
/// handlers as an `Extension<SessionUser>`.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let user = current_user(&state, &jar, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Rejects requests whose bearer token is not the webhook secret.
pub async fn require_webhook_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = bearer_token(request.headers())
        .is_some_and(|token| constant_time_eq(token, &state.config.webhook_secret));
    if !authorized {
        warn!("Webhook auth failed for {}", request.uri().path());
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_credentials_match() {
        let ok = |r: &LoginRequest| credentials_match("admin@hrbuddy.test", "s3cret", r);
        assert!(ok(&login("admin@hrbuddy.test", "s3cret")));
        assert!(ok(&login(" Admin@HRBuddy.test ", "s3cret")));
        assert!(!ok(&login("admin@hrbuddy.test", "s3cret ")));
        assert!(!ok(&login("admin@hrbuddy.test", "")));
        assert!(!ok(&login("other@hrbuddy.test", "s3cret")));
    }

    #[test]
    fn test_bearer_token_is_taken_verbatim() {
        assert_eq!(
            bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer abc123")])),
            Some("abc123")
        );
        assert_eq!(
            bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer  abc123")])),
            Some(" abc123")
        );
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_padded_secret_does_not_authorize() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer  s3cret")]);
        let token = bearer_token(&h).unwrap();
        assert!(!constant_time_eq(token, "s3cret"));
    }

    #[test]
    fn test_session_token_found_among_other_cookies() {
        let h = headers(&[
            (header::COOKIE, "theme=dark"),
            (header::COOKIE, "a=1; hrbuddy_session=tok42; b=2"),
        ]);
        assert_eq!(session_token(&CookieJar::from_headers(&h)).as_deref(), Some("tok42"));

        let empty = headers(&[(header::COOKIE, "hrbuddy_session=")]);
        assert_eq!(session_token(&CookieJar::from_headers(&empty)), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), 86_400);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86_400)));
    }

    #[test]
    fn test_end_session_drops_cookie() {
        let h = headers(&[(header::COOKIE, "hrbuddy_session=tok42")]);
        let jar = end_session(CookieJar::from_headers(&h));
        assert!(jar.get(SESSION_COOKIE).is_none());
        assert_eq!(session_token(&jar), None);
    }

    #[test]
    fn test_constant_time_eq_handles_length_mismatch() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secre"));
        assert!(!constant_time_eq("", "x"));
    }
}
