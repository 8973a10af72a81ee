//! Route gating policy: one definition, applied at every protected entry.
//!
//! Both functions are pure over the per-request [`Session`]; they perform no
//! I/O and nothing here is cached between requests, so role changes take
//! effect on the very next request.

use super::session::Session;

pub const SIGN_IN_ROUTE: &str = "/login";
pub const CLIENT_LANDING: &str = "/client/dashboard";
pub const ADMIN_LANDING: &str = "/admin/dashboard";
pub const DENIED_ROUTE: &str = "/denied";

/// Why a gated area refused entry. Neither case is an error: anonymous
/// callers are sent to sign in, authenticated-but-unprivileged callers get
/// an access-denied response that does not reveal whether the target exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenied {
    AuthenticationRequired,
    Forbidden,
}

/// Where a request belongs after authentication state is known.
///
/// This is the single policy for the entry route, the already-signed-in
/// shortcut on the sign-in page, and the post-login redirect.
pub fn resolve_landing_route(session: &Session, admin_role: &str) -> &'static str {
    match session.principal() {
        None => SIGN_IN_ROUTE,
        Some(p) if p.has_role(admin_role) => ADMIN_LANDING,
        Some(_) => CLIENT_LANDING,
    }
}

/// Decide whether `session` may enter an area requiring any one of
/// `required_roles`. An empty required set admits any authenticated
/// principal.
pub fn authorize(required_roles: &[&str], session: &Session) -> Result<(), GateDenied> {
    let Some(principal) = session.principal() else {
        return Err(GateDenied::AuthenticationRequired);
    };
    if required_roles.is_empty() {
        return Ok(());
    }
    if required_roles.iter().any(|r| principal.has_role(r)) {
        Ok(())
    } else {
        Err(GateDenied::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Principal;

    fn authed(roles: &[&str]) -> Session {
        Session::Authenticated(Principal {
            principal_id: uuid::Uuid::new_v4(),
            login_handle: "someone@gigl.com".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        })
    }

    #[test]
    fn anonymous_lands_at_sign_in() {
        assert_eq!(resolve_landing_route(&Session::Anonymous, "Admin"), SIGN_IN_ROUTE);
    }

    #[test]
    fn admin_lands_at_admin_dashboard() {
        assert_eq!(resolve_landing_route(&authed(&["Admin"]), "Admin"), ADMIN_LANDING);
    }

    #[test]
    fn client_lands_at_client_dashboard() {
        assert_eq!(resolve_landing_route(&authed(&[]), "Admin"), CLIENT_LANDING);
        assert_eq!(resolve_landing_route(&authed(&["Courier"]), "Admin"), CLIENT_LANDING);
    }

    #[test]
    fn gate_admin_area() {
        assert_eq!(authorize(&["Admin"], &authed(&["Admin"])), Ok(()));
        assert_eq!(authorize(&["Admin"], &authed(&[])), Err(GateDenied::Forbidden));
        assert_eq!(
            authorize(&["Admin"], &Session::Anonymous),
            Err(GateDenied::AuthenticationRequired)
        );
    }

    #[test]
    fn empty_required_set_admits_any_authenticated() {
        assert_eq!(authorize(&[], &authed(&[])), Ok(()));
        assert_eq!(authorize(&[], &Session::Anonymous), Err(GateDenied::AuthenticationRequired));
    }

    #[test]
    fn any_one_required_role_suffices() {
        assert_eq!(authorize(&["Admin", "Support"], &authed(&["Support"])), Ok(()));
        assert_eq!(
            authorize(&["Admin", "Support"], &authed(&["Courier"])),
            Err(GateDenied::Forbidden)
        );
    }
}
