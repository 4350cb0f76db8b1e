// ============================
// labpass-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod identity;
pub mod password;
pub mod rate_limit;
pub mod session;

pub use identity::{login_lab_head, sign_in_student, subject_hash};
pub use password::{hash_password, verify_password};
pub use rate_limit::CodeAttemptLimiter;
pub use session::{Session, SessionManager};
