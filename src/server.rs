//!
//! GIGL portal HTTP server
//! -----------------------
//! This module defines the Axum-based HTTP surface of the customer portal.
//!
//! Responsibilities:
//! - Session cookie transport (parse, set, clear) in front of the session manager.
//! - Sign-in/sign-out endpoints backed by the `identity` module.
//! - The entry redirect and the two role-gated dashboard areas.
//! - Public pages (sign-in form, access denied, shipment tracking, health).
//! - Startup wiring: admin provisioning runs to completion before the
//!   listener binds; a provisioning failure aborts the process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::config::PortalConfig;
use crate::email::{EmailSender, NoopEmailSender};
use crate::error::AppError;
use crate::identity::{
    authorize, resolve_landing_route, AuthProvider, GateDenied, LocalAuthProvider, LoginDenied,
    LoginRequest, Session, SessionManager, DENIED_ROUTE, SIGN_IN_ROUTE,
};
use crate::store::{FilePrincipalStore, PrincipalStore};

const SESSION_COOKIE: &str = "gigl_session";

/// Shared server state injected into all handlers.
///
/// Holds the principal store handle, the session manager, the auth provider
/// and the deploy-time config. All of it is constructed once at startup and
/// shared by reference; handlers hold no mutable state of their own.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PrincipalStore>,
    pub sessions: Arc<SessionManager>,
    pub auth: Arc<dyn AuthProvider>,
    pub email: Arc<dyn EmailSender>,
    pub admin_role: String,
}

/// Start the portal bound to the configured port.
///
/// Provisioning the bootstrap admin happens here, before the listener binds:
/// the process must not begin serving traffic half-provisioned.
pub async fn run_with_config(cfg: PortalConfig) -> anyhow::Result<()> {
    let store = Arc::new(FilePrincipalStore::open(&cfg.data_root)?);
    crate::provision::ensure_admin_provisioned(
        store.as_ref(),
        &cfg.admin_handle,
        &cfg.admin_password,
        &cfg.admin_role,
    )?;

    let sessions = Arc::new(SessionManager::with_ttl_days(cfg.session_ttl_days));
    let state = AppState {
        store: store.clone(),
        sessions: sessions.clone(),
        auth: Arc::new(LocalAuthProvider::new(store, sessions)),
        email: Arc::new(NoopEmailSender),
        admin_role: cfg.admin_role.clone(),
    };

    let app = build_router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting portal on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using the environment-derived config.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(PortalConfig::from_env()).await
}

/// Mount all routes. Public so integration tests can drive the router
/// without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(entry))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/client/dashboard", get(client_dashboard))
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/denied", get(denied))
        .route("/track", get(track))
        .route("/health", get(|| async { "gigl-portal ok" }))
        .with_state(state)
}

// ---------- cookie transport ----------

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path /; lifetime is enforced server-side by
    // the session manager's sliding expiry.
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

/// Derive the per-request session from the cookie. Evaluated fresh on every
/// request; nothing is cached between requests.
fn current_session(state: &AppState, headers: &HeaderMap) -> Session {
    let token = parse_cookie(headers, SESSION_COOKIE);
    state.sessions.current(token.as_deref())
}

// ---------- gating ----------

/// Apply the gating policy and translate a denial into its response:
/// anonymous callers go to sign-in, unprivileged callers to the denied page.
fn gate(required_roles: &[&str], session: &Session) -> Result<(), Response> {
    match authorize(required_roles, session) {
        Ok(()) => Ok(()),
        Err(GateDenied::AuthenticationRequired) => Err(Redirect::to(SIGN_IN_ROUTE).into_response()),
        Err(GateDenied::Forbidden) => Err(Redirect::to(DENIED_ROUTE).into_response()),
    }
}

fn app_error_response(err: AppError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({"status": "error", "error": err.code_str()}))).into_response()
}

// ---------- handlers ----------

async fn entry(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers);
    Redirect::to(resolve_landing_route(&session, &state.admin_role)).into_response()
}

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers);
    if session.is_authenticated() {
        // Already signed in: same landing decision as the entry route.
        return Redirect::to(resolve_landing_route(&session, &state.admin_role)).into_response();
    }
    Html(page(
        "Sign in",
        r#"<form method="post" action="/login">
  <label>Email <input type="email" name="username" required></label>
  <label>Password <input type="password" name="password" required></label>
  <button type="submit">Sign in</button>
</form>"#,
    ))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let req = LoginRequest { username: form.username, password: form.password };
    match state.auth.login(&req) {
        Ok(Ok(resp)) => {
            let principal = resp.session.principal.clone();
            let landing =
                resolve_landing_route(&Session::Authenticated(principal), &state.admin_role);
            let mut headers = HeaderMap::new();
            headers.insert(header::SET_COOKIE, set_session_cookie(&resp.session.token));
            (headers, Redirect::to(landing)).into_response()
        }
        Ok(Err(LoginDenied::BadCredentials)) => (
            StatusCode::UNAUTHORIZED,
            Html(page("Sign in", "<p>Invalid sign-in attempt.</p>")),
        )
            .into_response(),
        Ok(Err(LoginDenied::LockedOut)) => (
            StatusCode::FORBIDDEN,
            Html(page("Sign in", "<p>Account locked. Try again later.</p>")),
        )
            .into_response(),
        Err(e) => app_error_response(e),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        if state.sessions.terminate(&token) {
            info!("user signed out");
        }
    }
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    (h, Redirect::to(SIGN_IN_ROUTE)).into_response()
}

async fn client_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers);
    // Any authenticated principal may enter; re-checked on every request.
    if let Err(deny) = gate(&[], &session) {
        return deny;
    }
    let handle = session.principal().map(|p| p.login_handle.as_str()).unwrap_or_default();
    Html(page("Client dashboard", &format!("<p>Signed in as {}.</p>", handle))).into_response()
}

async fn admin_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers);
    if let Err(deny) = gate(&[state.admin_role.as_str()], &session) {
        return deny;
    }
    let handle = session.principal().map(|p| p.login_handle.as_str()).unwrap_or_default();
    Html(page("Admin dashboard", &format!("<p>Administrator {}.</p>", handle))).into_response()
}

async fn denied() -> Response {
    (StatusCode::FORBIDDEN, Html(page("Access denied", "<p>You do not have access to that area.</p>")))
        .into_response()
}

/// Public shipment-tracking shell; anonymous access is intentional.
async fn track() -> Response {
    Html(page(
        "Track shipment",
        r#"<form method="get" action="/track">
  <label>Waybill number <input type="text" name="waybill"></label>
  <button type="submit">Track</button>
</form>"#,
    ))
    .into_response()
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><title>GIGL Portal — {}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(raw).unwrap());
        h
    }

    #[test]
    fn parse_cookie_picks_the_named_pair() {
        let h = headers_with_cookie("other=1; gigl_session=abc123; last=2");
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn parse_cookie_without_header_is_none() {
        assert_eq!(parse_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let v = set_session_cookie("tok").to_str().unwrap().to_string();
        assert!(v.starts_with("gigl_session=tok"));
        assert!(v.contains("HttpOnly"));
        assert!(v.contains("SameSite=Strict"));
        let cleared = clear_session_cookie().to_str().unwrap().to_string();
        assert!(cleared.contains("Expires=Thu, 01 Jan 1970"));
    }

    #[test]
    fn gate_denials_redirect_to_the_right_places() {
        let deny = gate(&["Admin"], &Session::Anonymous).unwrap_err();
        assert_eq!(deny.status(), StatusCode::SEE_OTHER);
        assert_eq!(deny.headers().get(header::LOCATION).unwrap(), SIGN_IN_ROUTE);

        let client = Session::Authenticated(crate::identity::Principal {
            principal_id: uuid::Uuid::new_v4(),
            login_handle: "c@gigl.com".to_string(),
            roles: Default::default(),
        });
        let deny = gate(&["Admin"], &client).unwrap_err();
        assert_eq!(deny.headers().get(header::LOCATION).unwrap(), DENIED_ROUTE);
        assert!(gate(&[], &client).is_ok());
    }
}
