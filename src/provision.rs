//! Startup provisioning: make the privileged-access invariant true.
//!
//! Runs exactly once, synchronously, before the HTTP listener binds. Every
//! step is idempotent and tolerates partial state left by a crashed or
//! concurrent earlier run; any store failure other than "already exists"
//! aborts the remaining steps and is fatal to startup.

use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::store::PrincipalStore;

/// Guarantee that after return: the role exists, a principal with
/// `login_handle` exists, that principal is lockout-exempt, and the
/// role-assignment edge between them is present. Repeated runs with the same
/// inputs change nothing; the existing principal's credential is never
/// overwritten.
pub fn ensure_admin_provisioned(
    store: &dyn PrincipalStore,
    login_handle: &str,
    initial_password: &str,
    role_name: &str,
) -> AppResult<()> {
    // Step 1: role exists
    match store.find_role_by_name(role_name).map_err(|e| fatal("find_role", e))? {
        Some(_) => {}
        None => match store.create_role(role_name) {
            Ok(_) => info!(role = %role_name, "provisioning created role"),
            // Lost a creation race: the postcondition already holds.
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(fatal("create_role", e)),
        },
    }

    // Step 2: principal exists; an existing principal keeps its credential.
    match store
        .find_principal_by_login(login_handle)
        .map_err(|e| fatal("find_principal", e))?
    {
        Some(_) => {}
        None => match store.create_principal(login_handle, initial_password) {
            Ok(_) => info!(handle = %login_handle, "provisioning created admin principal"),
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(fatal("create_principal", e)),
        },
    }

    // Step 3: reapplied on every run; a prior run may have stopped here.
    store
        .set_lockout_exempt(login_handle, true)
        .map_err(|e| fatal("set_lockout_exempt", e))?;

    // Step 4: role-assignment edge
    let roles = store.roles_of(login_handle).map_err(|e| fatal("roles_of", e))?;
    if !roles.contains(role_name) {
        match store.assign_role(login_handle, role_name) {
            Ok(()) => info!(handle = %login_handle, role = %role_name, "provisioning assigned admin role"),
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(fatal("assign_role", e)),
        }
    }

    info!(handle = %login_handle, role = %role_name, "admin provisioning complete");
    Ok(())
}

fn fatal(step: &str, err: AppError) -> AppError {
    error!(step = %step, error = %err, "admin provisioning failed; refusing to start");
    AppError::provisioning(step.to_string(), err.to_string())
}
