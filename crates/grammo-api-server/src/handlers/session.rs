use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::info;

use crate::config::Settings;
use crate::models::chat::{SessionToken, StatusMessage};
use crate::services::SessionRegistry;
use crate::utils::error::ApiError;

const NO_ACTIVE_SESSION: &str = "No active session.";

/// Session cookie carrying `token`. Cross-site in production, so it must be
/// `Secure` + `SameSite=None` there.
pub fn session_cookie(settings: &Settings, token: &SessionToken) -> Cookie<'static> {
    let production = settings.is_production();
    let max_age = i64::try_from(settings.session.max_age_secs).unwrap_or(i64::MAX);

    Cookie::build((settings.session.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production { SameSite::None } else { SameSite::Lax })
        .max_age(TimeDuration::seconds(max_age))
        .build()
}

/// Presented session token, if any
pub fn session_token(jar: &CookieJar, settings: &Settings) -> Option<String> {
    jar.get(&settings.session.cookie_name)
        .map(|cookie| cookie.value().to_string())
}

pub async fn end_session_handler(
    State(settings): State<Arc<Settings>>,
    State(registry): State<Arc<SessionRegistry>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<StatusMessage>), ApiError> {
    let token = session_token(&jar, &settings)
        .filter(|t| !t.is_empty())
        .map(SessionToken::new)
        .ok_or_else(|| ApiError::NotFound(NO_ACTIVE_SESSION.to_string()))?;

    if !registry.end(&token).await {
        return Err(ApiError::NotFound(NO_ACTIVE_SESSION.to_string()));
    }

    info!("End session request: session={}", token.short());

    let removal = Cookie::build((settings.session.cookie_name.clone(), "")).path("/");
    Ok((
        jar.remove(removal),
        Json(StatusMessage {
            status: "success",
            message: "Session ended successfully".to_string(),
        }),
    ))
}
