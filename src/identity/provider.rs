use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::store::{CredentialCheck, PrincipalStore};

use super::principal::Principal;
use super::session::{SessionEntry, SessionManager};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: SessionEntry,
}

/// Normal sign-in refusals. Deliberately coarse so the response to the
/// caller never says which part of the credential was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDenied {
    BadCredentials,
    LockedOut,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<Result<LoginResponse, LoginDenied>>;
}

/// Sign-in against the local principal store: lockout gate, Argon2 verify,
/// then a session carrying the principal's role set as of this moment.
pub struct LocalAuthProvider {
    store: Arc<dyn PrincipalStore>,
    sessions: Arc<SessionManager>,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<dyn PrincipalStore>, sessions: Arc<SessionManager>) -> Self {
        Self { store, sessions }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<Result<LoginResponse, LoginDenied>> {
        match self.store.verify_credential(&req.username, &req.password)? {
            CredentialCheck::Ok(record) => {
                let principal = Principal {
                    principal_id: record.id,
                    login_handle: record.login_handle.clone(),
                    roles: record.roles.clone(),
                };
                let session = self.sessions.issue(principal);
                info!(user = %record.login_handle, "sign-in succeeded");
                Ok(Ok(LoginResponse { session }))
            }
            CredentialCheck::BadCredentials => {
                warn!(user = %req.username, "sign-in rejected: bad credentials");
                Ok(Err(LoginDenied::BadCredentials))
            }
            CredentialCheck::LockedOut => {
                warn!(user = %req.username, "sign-in rejected: account locked");
                Ok(Err(LoginDenied::LockedOut))
            }
        }
    }
}
