//! Google OAuth authorization-code flow: consent URL, one-shot local
//! callback listener, code exchange, and token refresh.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::token::StoredToken;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Port the one-shot callback listener binds on localhost.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_callback_port() -> u16 {
    8060
}

impl OAuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/oauth2callback", self.callback_port)
    }
}

/// Random hex state used for CSRF protection on the callback.
pub fn new_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn authorization_url(config: &OAuthConfig, state: &str) -> String {
    let mut url = url::Url::parse(GOOGLE_AUTH_URL).expect("static auth url");
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri())
        .append_pair("response_type", "code")
        .append_pair("scope", CALENDAR_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("include_granted_scopes", "true")
        .append_pair("prompt", "consent")
        .append_pair("state", state);
    url.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCallback {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    callback_tx: Arc<Mutex<Option<oneshot::Sender<OAuthCallback>>>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

/// Serve `/oauth2callback` on localhost until one valid callback arrives or
/// the timeout elapses, then shut the listener down.
pub async fn wait_for_oauth_callback(
    expected_state: impl Into<String>,
    port: u16,
    timeout: Duration,
) -> Result<OAuthCallback> {
    let expected_state = expected_state.into();
    let (callback_tx, callback_rx) = oneshot::channel::<OAuthCallback>();
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    let app_state = CallbackState {
        expected_state,
        callback_tx: Arc::new(Mutex::new(Some(callback_tx))),
        shutdown_tx: shutdown_tx.clone(),
    };

    let app = Router::new()
        .route("/oauth2callback", get(handle_callback))
        .with_state(app_state);

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind callback server at {addr}"))?;

    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown_rx;
                let _ = rx.recv().await;
            })
            .await
    });

    let callback = tokio::select! {
        result = callback_rx => {
            match result {
                Ok(cb) => Ok(cb),
                Err(_) => Err(anyhow!("callback channel closed before receiving OAuth code")),
            }
        }
        _ = tokio::time::sleep(timeout) => {
            Err(anyhow!("timed out waiting for OAuth callback"))
        }
    };

    let _ = shutdown_tx.send(());
    let _ = server_task.await;

    callback
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    match validate_callback(query, &state.expected_state) {
        Ok(callback) => {
            if let Some(tx) = state.callback_tx.lock().await.take() {
                let _ = tx.send(callback);
            }
            let _ = state.shutdown_tx.send(());
            (
                StatusCode::OK,
                Html("<h2>Authentication successful</h2><p>You can now close this tab.</p>"),
            )
                .into_response()
        }
        Err((status, message)) => (status, Html(message)).into_response(),
    }
}

fn validate_callback(
    query: CallbackQuery,
    expected_state: &str,
) -> std::result::Result<OAuthCallback, (StatusCode, String)> {
    let code = query
        .code
        .filter(|v| !v.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "missing OAuth code".to_string()))?;
    let state = query
        .state
        .filter(|v| !v.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "missing OAuth state".to_string()))?;

    if state != expected_state {
        return Err((
            StatusCode::UNAUTHORIZED,
            "state mismatch for OAuth callback".to_string(),
        ));
    }

    Ok(OAuthCallback { code, state })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

fn to_stored_token(body: TokenResponse, previous_refresh: Option<String>) -> StoredToken {
    StoredToken {
        access_token: body.access_token,
        // Google omits the refresh token on a refresh response; keep the old one.
        refresh_token: body.refresh_token.or(previous_refresh),
        expires_at: Utc::now().timestamp() + body.expires_in,
    }
}

pub async fn exchange_code(
    http: &reqwest::Client,
    config: &OAuthConfig,
    token_url: &str,
    code: &str,
) -> Result<StoredToken> {
    let resp = http
        .post(token_url)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &config.redirect_uri()),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed ({status}): {text}"));
    }

    let body: TokenResponse = resp.json().await?;
    Ok(to_stored_token(body, None))
}

pub async fn refresh_access_token(
    http: &reqwest::Client,
    config: &OAuthConfig,
    token_url: &str,
    refresh_token: &str,
) -> Result<StoredToken> {
    let resp = http
        .post(token_url)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token refresh failed ({status}): {text}"));
    }

    let body: TokenResponse = resp.json().await?;
    Ok(to_stored_token(body, Some(refresh_token.to_string())))
}
