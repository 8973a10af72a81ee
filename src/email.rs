//! Outbound email boundary.
//!
//! The portal itself never blocks on mail; account confirmation and
//! password-reset flows hang off this seam. The shipped implementation is a
//! no-op that logs, matching the legacy portal's development sender.

use tracing::debug;

use crate::error::AppResult;

pub trait EmailSender: Send + Sync {
    fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Development sender: records the message and drops it.
pub struct NoopEmailSender;

impl EmailSender for NoopEmailSender {
    fn send_email(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        debug!(to = %to, subject = %subject, "email suppressed (noop sender)");
        Ok(())
    }
}
