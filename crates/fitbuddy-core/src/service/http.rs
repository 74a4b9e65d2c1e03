//! The HTTP surface: webhook intake plus the token-login web dashboard.
//!
//! The webhook POST acknowledges immediately and processes events on spawned
//! tasks; internal failures never surface to the messaging platform, which
//! would otherwise retry-storm the endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::catalog::ExerciseCatalog;
use crate::channel::whatsapp;
use crate::config::Config;
use crate::directory::UserDirectory;
use crate::engine::Engine;
use crate::service::pages;
use crate::service::websession::{
    session_from_cookie_header, WebSession, WebSessionStore, SESSION_COOKIE,
};
use crate::storage::Database;
use crate::token::{RedeemError, RejectReason, TokenBridge};
use crate::types::MuscleGroup;

/// Shared application state for the HTTP service.
pub struct AppState {
    pub config: Config,
    pub engine: Arc<Engine>,
    pub bridge: Arc<TokenBridge>,
    pub directory: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub workouts: Database,
    pub web_sessions: WebSessionStore,
}

/// Create the axum Router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_home))
        // Messaging platform webhook
        .route("/webhook", get(handle_webhook_verify))
        .route("/webhook", post(handle_webhook))
        // Web surface
        .route("/login/{token}", get(handle_login))
        .route("/dashboard", get(handle_dashboard))
        .route("/exercises/{group}", get(handle_exercises))
        .route("/logout", get(handle_logout))
        // Health
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST]),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("fitbuddy listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn handle_home() -> Html<String> {
    Html(pages::render_home())
}

/// Webhook subscription handshake: echo the challenge when the shared verify
/// token matches.
pub fn verify_subscription(
    params: &HashMap<String, String>,
    expected_token: &str,
) -> Option<String> {
    let mode = params.get("hub.mode")?;
    let token = params.get("hub.verify_token")?;
    let challenge = params.get("hub.challenge")?;
    (mode == "subscribe" && token == expected_token).then(|| challenge.clone())
}

/// GET /webhook — platform subscription verification.
async fn handle_webhook_verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match verify_subscription(&params, &state.config.gateway.verify_token) {
        Some(challenge) => {
            info!("Webhook subscription verified");
            challenge.into_response()
        }
        None => {
            warn!("Webhook verification failed");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// POST /webhook — inbound events. Always acknowledged with 200; processing
/// happens off the request path.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, &'static str) {
    match whatsapp::parse_webhook(&body) {
        Ok(event) => {
            for normalized in whatsapp::normalize(&event) {
                let engine = state.engine.clone();
                tokio::spawn(async move {
                    engine.handle_event(normalized).await;
                });
            }
        }
        Err(e) => {
            // Malformed payloads are acknowledged, never fatal.
            warn!("Unparseable webhook payload ({} bytes): {}", body.len(), e);
        }
    }
    (StatusCode::OK, "ok")
}

/// GET /login/{token} — one-time token login from chat.
async fn handle_login(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> Response {
    let user_id = match state.bridge.redeem(&token) {
        Ok(user_id) => user_id,
        Err(RedeemError::Rejected(reason)) => return rejection_page(reason),
        Err(RedeemError::Storage(e)) => {
            error!("Login token lookup failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::render_error(
                    "Login Failed",
                    "An error occurred. Please try again.",
                )),
            )
                .into_response();
        }
    };

    let profile = match state.directory.get(&user_id) {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return (
                StatusCode::FORBIDDEN,
                Html(pages::render_error(
                    "User Not Found",
                    "Could not find your user account.",
                )),
            )
                .into_response();
        }
        Err(e) => {
            error!("Directory lookup failed during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::render_error(
                    "Login Failed",
                    "An error occurred. Please try again.",
                )),
            )
                .into_response();
        }
    };

    let sid = state.web_sessions.create(WebSession {
        user_id: user_id.clone(),
        name: profile.name.clone(),
        language: profile.language,
    });
    info!("Web login established for {}", user_id);

    let cookie = format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax");
    ([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response()
}

fn rejection_page(reason: RejectReason) -> Response {
    let (title, message) = match reason {
        RejectReason::NotFound => (
            "Invalid Login Link",
            "This login link is not valid. Please request a new one from WhatsApp.",
        ),
        RejectReason::AlreadyUsed => (
            "Link Already Used",
            "This login link has already been used. Please request a new one from WhatsApp.",
        ),
        RejectReason::Expired => (
            "Link Expired",
            "This login link has expired. Please request a new one from WhatsApp.",
        ),
    };
    (
        StatusCode::FORBIDDEN,
        Html(pages::render_error(title, message)),
    )
        .into_response()
}

fn current_session(state: &AppState, headers: &HeaderMap) -> Option<WebSession> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let sid = session_from_cookie_header(cookie_header)?;
    state.web_sessions.get(sid)
}

/// GET /dashboard — the workout dashboard.
async fn handle_dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(session) = current_session(&state, &headers) else {
        return Redirect::to("/").into_response();
    };

    let data = state.workouts.workout_summary(&session.user_id).and_then(|summary| {
        let workouts = state.workouts.recent_workouts(&session.user_id, 50)?;
        let records = state.workouts.personal_records(&session.user_id, 10)?;
        Ok((summary, workouts, records))
    });

    match data {
        Ok((summary, workouts, records)) => Html(pages::render_dashboard(
            session.name.as_deref(),
            &summary,
            &workouts,
            &records,
        ))
        .into_response(),
        Err(e) => {
            error!("Dashboard query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::render_error(
                    "Dashboard Error",
                    "Could not load your workout data. Please try again.",
                )),
            )
                .into_response()
        }
    }
}

/// GET /exercises/{group} — browse the catalog for one muscle group.
async fn handle_exercises(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(group): Path<String>,
) -> Response {
    let Some(session) = current_session(&state, &headers) else {
        return Redirect::to("/").into_response();
    };

    let Ok(group) = group.parse::<MuscleGroup>() else {
        return (
            StatusCode::NOT_FOUND,
            Html(pages::render_error(
                "Unknown Muscle Group",
                "That muscle group does not exist.",
            )),
        )
            .into_response();
    };

    let lang = session.language.unwrap_or(crate::types::Language::En);
    match state.catalog.find_by_muscle_group(group) {
        Ok(records) => Html(pages::render_exercises(group, &records, lang)).into_response(),
        Err(e) => {
            error!("Catalog query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::render_error(
                    "Catalog Error",
                    "Could not load exercises. Please try again.",
                )),
            )
                .into_response()
        }
    }
}

/// GET /logout — drop the web session.
async fn handle_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        if let Some(sid) = session_from_cookie_header(cookie_header) {
            state.web_sessions.remove(sid);
        }
    }
    let expire = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0");
    ([(header::SET_COOKIE, expire)], Redirect::to("/")).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: crate::VERSION,
    })
}
