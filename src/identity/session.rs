use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

/// The per-request authentication state. Derived fresh for every request
/// from the session cookie; never persisted and never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Authenticated(Principal),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Issues and validates opaque session tokens with a sliding lifetime.
///
/// One instance is constructed at startup and shared by handle; all state is
/// interior, so concurrent requests need no coordination beyond the lock.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, SessionEntry>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(150 * 24 * 60 * 60))
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn with_ttl_days(days: u64) -> Self {
        Self::new(Duration::from_secs(days * 24 * 60 * 60))
    }

    pub fn issue(&self, principal: Principal) -> SessionEntry {
        let now = Instant::now();
        let token = gen_token();
        let entry = SessionEntry {
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token, entry.clone());
        tprintln!("session.issue user={} ttl_secs={}", principal.login_handle, self.ttl.as_secs());
        entry
    }

    /// Resolve the session for a request. A live token slides its expiry
    /// forward by the full TTL; a stale token is dropped on sight.
    pub fn current(&self, token: Option<&str>) -> Session {
        let Some(token) = token else { return Session::Anonymous };
        let now = Instant::now();
        let mut map = self.sessions.write();
        match map.get_mut(token) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Session::Authenticated(entry.principal.clone())
            }
            Some(_) => {
                map.remove(token);
                Session::Anonymous
            }
            None => Session::Anonymous,
        }
    }

    /// Invalidate a session. Returns whether a live session was removed.
    pub fn terminate(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token).is_some();
        if removed {
            tprintln!("session.terminate token_present=true");
        }
        removed
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(handle: &str) -> Principal {
        Principal {
            principal_id: uuid::Uuid::new_v4(),
            login_handle: handle.to_string(),
            roles: Default::default(),
        }
    }

    #[test]
    fn issue_then_current_yields_authenticated() {
        let sm = SessionManager::default();
        let entry = sm.issue(principal("a@gigl.com"));
        let session = sm.current(Some(&entry.token));
        assert!(session.is_authenticated());
        assert_eq!(session.principal().unwrap().login_handle, "a@gigl.com");
    }

    #[test]
    fn unknown_and_missing_tokens_are_anonymous() {
        let sm = SessionManager::default();
        assert_eq!(sm.current(None), Session::Anonymous);
        assert_eq!(sm.current(Some("no-such-token")), Session::Anonymous);
    }

    #[test]
    fn terminate_makes_the_token_anonymous() {
        let sm = SessionManager::default();
        let entry = sm.issue(principal("b@gigl.com"));
        assert!(sm.terminate(&entry.token));
        assert_eq!(sm.current(Some(&entry.token)), Session::Anonymous);
        // Second terminate is a no-op
        assert!(!sm.terminate(&entry.token));
    }

    #[test]
    fn expired_token_is_dropped() {
        let sm = SessionManager::new(Duration::from_secs(0));
        let entry = sm.issue(principal("c@gigl.com"));
        assert_eq!(sm.current(Some(&entry.token)), Session::Anonymous);
        assert_eq!(sm.live_sessions(), 0);
    }

    #[test]
    fn validation_slides_expiry_forward() {
        let sm = SessionManager::new(Duration::from_secs(3600));
        let entry = sm.issue(principal("d@gigl.com"));
        let before = entry.expires_at;
        std::thread::sleep(Duration::from_millis(10));
        assert!(sm.current(Some(&entry.token)).is_authenticated());
        let after = sm.sessions.read().get(&entry.token).unwrap().expires_at;
        assert!(after > before);
    }
}
