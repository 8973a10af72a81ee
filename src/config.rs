//! Deploy-time configuration for the portal.
//!
//! Everything here is fixed at process start and read from the environment;
//! none of these values are ever derived from end-user input. The bootstrap
//! admin credential carries a development default for local parity with the
//! legacy portal; real deployments must supply `PORTAL_ADMIN_PASSWORD`.

#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Port the HTTP listener binds on.
    pub http_port: u16,
    /// Directory holding the principal catalog.
    pub data_root: String,
    /// Login handle (and contact address) of the bootstrap admin.
    pub admin_handle: String,
    /// Initial credential registered only when the admin principal is first created.
    pub admin_password: String,
    /// Name of the privileged role.
    pub admin_role: String,
    /// Sliding session lifetime, in days.
    pub session_ttl_days: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            http_port: 7878,
            data_root: "data".to_string(),
            admin_handle: "admin@gigl.com".to_string(),
            admin_password: "gigl@123456".to_string(),
            admin_role: "Admin".to_string(),
            session_ttl_days: 150,
        }
    }
}

impl PortalConfig {
    /// Build a config from `PORTAL_*` environment variables, falling back to
    /// the defaults above for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            http_port: env_parsed("PORTAL_HTTP_PORT", d.http_port),
            data_root: std::env::var("PORTAL_DATA_ROOT").unwrap_or(d.data_root),
            admin_handle: std::env::var("PORTAL_ADMIN_HANDLE").unwrap_or(d.admin_handle),
            admin_password: std::env::var("PORTAL_ADMIN_PASSWORD").unwrap_or(d.admin_password),
            admin_role: std::env::var("PORTAL_ADMIN_ROLE").unwrap_or(d.admin_role),
            session_ttl_days: env_parsed("PORTAL_SESSION_TTL_DAYS", d.session_ttl_days),
        }
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}
