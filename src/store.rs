//! Principal store: durable users, credentials and role-assignment edges.
//!
//! The `PrincipalStore` trait is the boundary the provisioner and the sign-in
//! path program against. `FilePrincipalStore` is the shipped implementation,
//! a JSON catalog under the data root guarded by a `RwLock`; every mutation
//! is check-then-act under the write lock and then persisted atomically
//! (temp file + rename), so concurrent writers converge instead of tripping
//! duplicate-key failures.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::security;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: Uuid,
    /// Unique login handle; doubles as the contact address.
    pub login_handle: String,
    pub email: String,
    /// Argon2 PHC string. Opaque to everything outside this module.
    pub password_hash: String,
    pub lockout_exempt: bool,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a credential check on the sign-in path.
#[derive(Debug, Clone)]
pub enum CredentialCheck {
    Ok(PrincipalRecord),
    BadCredentials,
    LockedOut,
}

/// Storage boundary consumed by provisioning and sign-in.
///
/// Lookups return `Ok(None)` for absent records; `create_*` return a
/// `Conflict` error when the record already exists so callers can treat a
/// lost creation race as "already satisfied" and re-read.
pub trait PrincipalStore: Send + Sync {
    fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleRecord>>;
    fn create_role(&self, name: &str) -> AppResult<RoleRecord>;
    fn find_principal_by_login(&self, handle: &str) -> AppResult<Option<PrincipalRecord>>;
    /// Create a principal using `handle` as both login name and contact
    /// address, registering `password` through the credential path.
    fn create_principal(&self, handle: &str, password: &str) -> AppResult<PrincipalRecord>;
    fn set_lockout_exempt(&self, handle: &str, exempt: bool) -> AppResult<()>;
    fn roles_of(&self, handle: &str) -> AppResult<BTreeSet<String>>;
    fn assign_role(&self, handle: &str, role: &str) -> AppResult<()>;
    /// Verify a credential, enforcing the lockout policy as a side effect.
    fn verify_credential(&self, handle: &str, password: &str) -> AppResult<CredentialCheck>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    #[serde(default)]
    roles: Vec<RoleRecord>,
    #[serde(default)]
    principals: Vec<PrincipalRecord>,
}

pub struct FilePrincipalStore {
    path: PathBuf,
    inner: RwLock<Catalog>,
}

impl FilePrincipalStore {
    /// Open (or start) the catalog at `<data_root>/principals.json`.
    pub fn open(data_root: impl AsRef<Path>) -> AppResult<Self> {
        let root = data_root.as_ref();
        std::fs::create_dir_all(root)?;
        let path = root.join("principals.json");
        let catalog = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| AppError::io("catalog_parse".to_string(), e.to_string()))?
        } else {
            Catalog::default()
        };
        Ok(Self { path, inner: RwLock::new(catalog) })
    }

    fn persist(&self, catalog: &Catalog) -> AppResult<()> {
        let raw = serde_json::to_string_pretty(catalog)
            .map_err(|e| AppError::internal("catalog_encode".to_string(), e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn find_principal_mut<'a>(catalog: &'a mut Catalog, handle: &str) -> Option<&'a mut PrincipalRecord> {
    catalog
        .principals
        .iter_mut()
        .find(|p| p.login_handle.eq_ignore_ascii_case(handle))
}

impl PrincipalStore for FilePrincipalStore {
    fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleRecord>> {
        let catalog = self.inner.read();
        Ok(catalog.roles.iter().find(|r| r.name == name).cloned())
    }

    fn create_role(&self, name: &str) -> AppResult<RoleRecord> {
        let mut catalog = self.inner.write();
        if catalog.roles.iter().any(|r| r.name == name) {
            return Err(AppError::conflict("role_exists".to_string(), name.to_string()));
        }
        let role = RoleRecord { name: name.to_string(), created_at: Utc::now() };
        catalog.roles.push(role.clone());
        self.persist(&catalog)?;
        Ok(role)
    }

    fn find_principal_by_login(&self, handle: &str) -> AppResult<Option<PrincipalRecord>> {
        let catalog = self.inner.read();
        Ok(catalog
            .principals
            .iter()
            .find(|p| p.login_handle.eq_ignore_ascii_case(handle))
            .cloned())
    }

    fn create_principal(&self, handle: &str, password: &str) -> AppResult<PrincipalRecord> {
        security::check_password_policy(password)?;
        let hash = security::hash_password(password)?;
        let mut catalog = self.inner.write();
        if find_principal_mut(&mut catalog, handle).is_some() {
            return Err(AppError::conflict("principal_exists".to_string(), handle.to_string()));
        }
        let record = PrincipalRecord {
            id: Uuid::new_v4(),
            login_handle: handle.to_string(),
            email: handle.to_string(),
            password_hash: hash,
            lockout_exempt: false,
            failed_attempts: 0,
            locked_until: None,
            roles: BTreeSet::new(),
            created_at: Utc::now(),
        };
        catalog.principals.push(record.clone());
        self.persist(&catalog)?;
        Ok(record)
    }

    fn set_lockout_exempt(&self, handle: &str, exempt: bool) -> AppResult<()> {
        let mut catalog = self.inner.write();
        let Some(p) = find_principal_mut(&mut catalog, handle) else {
            return Err(AppError::not_found("principal".to_string(), handle.to_string()));
        };
        p.lockout_exempt = exempt;
        if exempt {
            // An exempt principal carries no lock state.
            p.failed_attempts = 0;
            p.locked_until = None;
        }
        self.persist(&catalog)
    }

    fn roles_of(&self, handle: &str) -> AppResult<BTreeSet<String>> {
        let catalog = self.inner.read();
        let Some(p) = catalog
            .principals
            .iter()
            .find(|p| p.login_handle.eq_ignore_ascii_case(handle))
        else {
            return Err(AppError::not_found("principal".to_string(), handle.to_string()));
        };
        Ok(p.roles.clone())
    }

    fn assign_role(&self, handle: &str, role: &str) -> AppResult<()> {
        let mut catalog = self.inner.write();
        if !catalog.roles.iter().any(|r| r.name == role) {
            return Err(AppError::not_found("role".to_string(), role.to_string()));
        }
        let Some(p) = find_principal_mut(&mut catalog, handle) else {
            return Err(AppError::not_found("principal".to_string(), handle.to_string()));
        };
        // Set semantics: assigning an already-held role is a no-op.
        if !p.roles.insert(role.to_string()) {
            return Ok(());
        }
        self.persist(&catalog)
    }

    fn verify_credential(&self, handle: &str, password: &str) -> AppResult<CredentialCheck> {
        let now = Utc::now();
        let mut catalog = self.inner.write();
        let Some(p) = find_principal_mut(&mut catalog, handle) else {
            return Ok(CredentialCheck::BadCredentials);
        };
        if !p.lockout_exempt {
            if let Some(until) = p.locked_until {
                if until > now {
                    return Ok(CredentialCheck::LockedOut);
                }
                // Lock window has passed
                p.locked_until = None;
                p.failed_attempts = 0;
            }
        }
        if security::verify_password(&p.password_hash, password) {
            if p.failed_attempts > 0 || p.locked_until.is_some() {
                p.failed_attempts = 0;
                p.locked_until = None;
                self.persist(&catalog)?;
                let p = catalog
                    .principals
                    .iter()
                    .find(|p| p.login_handle.eq_ignore_ascii_case(handle))
                    .cloned()
                    .ok_or_else(|| AppError::internal("catalog".to_string(), "principal vanished".to_string()))?;
                return Ok(CredentialCheck::Ok(p));
            }
            return Ok(CredentialCheck::Ok(p.clone()));
        }
        // Failed attempt: count it unless the principal is exempt.
        if !p.lockout_exempt {
            p.failed_attempts += 1;
            if p.failed_attempts >= security::MAX_FAILED_ATTEMPTS {
                p.locked_until = Some(now + Duration::minutes(security::LOCKOUT_MINUTES));
                warn!(handle = %handle, "account locked after repeated failed sign-ins");
            }
            self.persist(&catalog)?;
        }
        Ok(CredentialCheck::BadCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn catalog_survives_reopen() {
        let tmp = tempdir().unwrap();
        {
            let store = FilePrincipalStore::open(tmp.path()).unwrap();
            store.create_role("Admin").unwrap();
            store.create_principal("admin@gigl.com", "gigl@123456").unwrap();
            store.assign_role("admin@gigl.com", "Admin").unwrap();
        }
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        assert!(store.find_role_by_name("Admin").unwrap().is_some());
        let p = store.find_principal_by_login("admin@gigl.com").unwrap().unwrap();
        assert!(p.roles.contains("Admin"));
    }

    #[test]
    fn duplicate_creates_report_conflict() {
        let tmp = tempdir().unwrap();
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        store.create_role("Admin").unwrap();
        assert!(store.create_role("Admin").unwrap_err().is_already_exists());
        store.create_principal("a@gigl.com", "12345").unwrap();
        assert!(store
            .create_principal("a@gigl.com", "12345")
            .unwrap_err()
            .is_already_exists());
    }

    #[test]
    fn assign_role_is_a_set_edge() {
        let tmp = tempdir().unwrap();
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        store.create_role("Admin").unwrap();
        store.create_principal("a@gigl.com", "12345").unwrap();
        store.assign_role("a@gigl.com", "Admin").unwrap();
        store.assign_role("a@gigl.com", "Admin").unwrap();
        assert_eq!(store.roles_of("a@gigl.com").unwrap().len(), 1);
    }

    #[test]
    fn assign_unknown_role_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        store.create_principal("a@gigl.com", "12345").unwrap();
        let err = store.assign_role("a@gigl.com", "Ghost").unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn lockout_counts_and_exemption() {
        let tmp = tempdir().unwrap();
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        store.create_principal("c@gigl.com", "12345").unwrap();
        for _ in 0..security::MAX_FAILED_ATTEMPTS {
            let out = store.verify_credential("c@gigl.com", "wrong").unwrap();
            assert!(matches!(out, CredentialCheck::BadCredentials));
        }
        // Locked now, even with the right password
        assert!(matches!(
            store.verify_credential("c@gigl.com", "12345").unwrap(),
            CredentialCheck::LockedOut
        ));

        // Exemption clears the lock and disables counting
        store.set_lockout_exempt("c@gigl.com", true).unwrap();
        for _ in 0..security::MAX_FAILED_ATTEMPTS * 2 {
            store.verify_credential("c@gigl.com", "wrong").unwrap();
        }
        assert!(matches!(
            store.verify_credential("c@gigl.com", "12345").unwrap(),
            CredentialCheck::Ok(_)
        ));
    }

    #[test]
    fn successful_login_resets_counter() {
        let tmp = tempdir().unwrap();
        let store = FilePrincipalStore::open(tmp.path()).unwrap();
        store.create_principal("d@gigl.com", "12345").unwrap();
        for _ in 0..3 {
            store.verify_credential("d@gigl.com", "nope").unwrap();
        }
        assert!(matches!(
            store.verify_credential("d@gigl.com", "12345").unwrap(),
            CredentialCheck::Ok(_)
        ));
        let p = store.find_principal_by_login("d@gigl.com").unwrap().unwrap();
        assert_eq!(p.failed_attempts, 0);
    }
}
