//! Central identity and session management for the portal.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod authorizer;

pub use principal::Principal;
pub use session::{Session, SessionEntry, SessionManager, SessionToken};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, LoginDenied};
pub use authorizer::{
    authorize, resolve_landing_route, GateDenied, ADMIN_LANDING, CLIENT_LANDING, DENIED_ROUTE,
    SIGN_IN_ROUTE,
};
