// ============================
// labpass-backend/src/auth/identity.rs
// ============================
//! Account lookup for the two ways in: a forwarded identity provider subject
//! for students, and username/password for lab heads.
use labpass_common::{Account, Role};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::auth::password::verify_password;
use crate::error::AppError;
use crate::storage::AccountStore;
use crate::validation;

/// Hex SHA-256 of a provider subject. Only the digest is ever stored.
pub fn subject_hash(subject: &str) -> String {
    format!("{:x}", Sha256::digest(subject.as_bytes()))
}

/// Find or create the student account for `subject`
pub async fn sign_in_student<A: AccountStore + ?Sized>(store: &A, subject: &str) -> Result<Account, AppError> {
    validation::validate_subject(subject)?;
    let sub_id = subject_hash(subject);

    let (account, created) = store.create_if_absent(Account::student(sub_id)).await?;
    if created {
        info!(sub_id = %account.sub_id, "student account created");
    }
    if account.role != Role::Student {
        return Err(AppError::Forbidden("not a student account".to_string()));
    }
    Ok(account)
}

/// Check lab head credentials
pub async fn login_lab_head<A: AccountStore + ?Sized>(
    store: &A,
    username: &str,
    password: &str,
) -> Result<Account, AppError> {
    let rejected = || AppError::Auth("Invalid username or password".to_string());

    let Some(account) = store.find_by_subject(username).await? else {
        debug!(username = %username, "login for unknown account");
        return Err(rejected());
    };
    if account.role != Role::LabHead {
        return Err(rejected());
    }
    let verified = account
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(hash, password));
    if !verified {
        debug!(username = %username, "wrong lab head password");
        return Err(rejected());
    }
    Ok(account)
}
