// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const CODES_ROTATED: &str = "codes.rotated";
pub const CODE_CHECK_ACCEPTED: &str = "codes.check.accepted";
pub const CODE_CHECK_REJECTED: &str = "codes.check.rejected";
pub const LAB_ACTIVATED: &str = "labs.activated";
pub const LAB_DEACTIVATED: &str = "labs.deactivated";
pub const LABS_ACTIVE: &str = "labs.active";
pub const CHECKLIST_SYNC_FAILED: &str = "checklist.sync.failed";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSIONS_ACTIVE: &str = "session.active";
pub const CODE_LOCKOUT: &str = "codes.check.lockout";
pub const REQUESTS_THROTTLED: &str = "http.throttled";
