// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared between the `labpass` server and its clients.
//! This module defines the persisted records and the JSON bodies of the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the keynote pseudo-lab. It only carries a talk code.
pub const KEYNOTE: &str = "KEYNOTE";

/// Identifier used to check a seminar code against every presenting lab.
pub const TALK_LAB: &str = "TALK";

/// Name of the synthetic seminar entry at the end of every checklist.
pub const TALK_ENTRY: &str = "Talk";

/// One record of the persisted lab catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LabRecord {
    /// Canonical (uppercased) lab identifier
    pub name: String,
    /// Inactive records stay on disk but are not catalog members
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl LabRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
        }
    }
}

/// Which of a lab's two codes is meant
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// Code displayed at the physical booth
    Booth,
    /// Code displayed during the lab's seminar talk
    Talk,
}

/// Account role
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "labHead")]
    LabHead,
}

/// Degree programme picked at registration. `Unset` is stored as `-`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Course {
    #[serde(rename = "BSCS-ST")]
    BscsSt,
    #[serde(rename = "BSMSCS")]
    Bsmscs,
    #[serde(rename = "BSCS-NIS")]
    BscsNis,
    #[serde(rename = "BSCS-CSE")]
    BscsCse,
    #[serde(rename = "BSIET-GD")]
    BsietGd,
    #[serde(rename = "BSIET-AD")]
    BsietAd,
    #[serde(rename = "Others")]
    Others,
    #[default]
    #[serde(rename = "-")]
    Unset,
}

/// Stored account, either a student or a lab head
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Hex SHA-256 of the identity provider subject, or a lab head's username
    #[serde(rename = "subID")]
    pub sub_id: String,
    /// Lab bound to a lab head account (or the officers name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Student ID number, set at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_num: Option<String>,
    #[serde(default)]
    pub course: Course,
    #[serde(default)]
    pub role: Role,
    /// Argon2 hash of a lab head's password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl Account {
    /// A fresh, unregistered student account
    pub fn student(sub_id: impl Into<String>) -> Self {
        Self {
            sub_id: sub_id.into(),
            name: None,
            id_num: None,
            course: Course::Unset,
            role: Role::Student,
            password_hash: None,
        }
    }

    /// A lab head account bound to `lab`
    pub fn lab_head(sub_id: impl Into<String>, lab: impl Into<String>, password_hash: String) -> Self {
        Self {
            sub_id: sub_id.into(),
            name: Some(lab.into()),
            id_num: None,
            course: Course::Unset,
            role: Role::LabHead,
            password_hash: Some(password_hash),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.id_num.is_some() && self.course != Course::Unset
    }
}

/// One line of a student's checklist
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistEntry {
    pub lab_name: String,
    #[serde(default)]
    pub visited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_time: Option<DateTime<Utc>>,
}

impl ChecklistEntry {
    pub fn unvisited(lab_name: impl Into<String>) -> Self {
        Self {
            lab_name: lab_name.into(),
            visited: false,
            visit_time: None,
        }
    }
}

/// Per-student record of visited labs
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id_num: String,
    pub lab_list: Vec<ChecklistEntry>,
}

impl Checklist {
    /// Build a checklist with one unvisited entry per lab, sorted, followed by the talk entry
    pub fn for_labs<I, S>(id_num: impl Into<String>, labs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = labs.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let mut lab_list: Vec<ChecklistEntry> = names.into_iter().map(ChecklistEntry::unvisited).collect();
        lab_list.push(ChecklistEntry::unvisited(TALK_ENTRY));
        Self {
            id_num: id_num.into(),
            lab_list,
        }
    }

    pub fn entry(&self, lab_name: &str) -> Option<&ChecklistEntry> {
        self.lab_list.iter().find(|e| e.lab_name == lab_name)
    }

    pub fn contains(&self, lab_name: &str) -> bool {
        self.entry(lab_name).is_some()
    }

    pub fn is_visited(&self, lab_name: &str) -> bool {
        self.entry(lab_name).is_some_and(|e| e.visited)
    }

    /// Every entry, the talk included, has been visited
    pub fn is_complete(&self) -> bool {
        self.lab_list.iter().all(|e| e.visited)
    }

    /// Lab entries without the synthetic talk entry
    pub fn lab_names(&self) -> impl Iterator<Item = &str> {
        self.lab_list
            .iter()
            .map(|e| e.lab_name.as_str())
            .filter(|name| *name != TALK_ENTRY)
    }
}

// ---------------------------------------------------------------------------
// HTTP request / response bodies
// ---------------------------------------------------------------------------

/// Student sign-in forwarded by the identity provider integration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IdentityRequest {
    /// Verified `sub` claim of the provider
    pub subject: String,
}

/// Lab head credentials
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabLoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued session
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionResponse {
    /// Absent when no session was opened (register-only mode, already registered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Where the client should go next
    pub redirect: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub id_num: String,
    pub id_num_confirm: String,
    pub course: Course,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterResponse {
    pub id_num: String,
    /// Set when the server ended the session (register-only mode)
    pub logged_out: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChecklistResponse {
    pub id_num: String,
    pub lab_list: Vec<ChecklistEntry>,
    pub complete: bool,
}

/// Student view of a single lab (or the seminar)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StudentLabResponse {
    pub lab: String,
    pub id_num: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CodeCheckRequest {
    pub lab_name: String,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SeminarCheckRequest {
    pub code: String,
}

/// Result of a code submission
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Accepted,
    NotActivated,
    Incorrect,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CodeCheckResponse {
    pub lab_name: String,
    pub outcome: CheckOutcome,
    pub message: String,
}

/// What a lab head's screen displays
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabCodeResponse {
    pub lab_name: String,
    pub code: String,
    /// Seconds until the next rotation
    pub countdown: u64,
    /// Rotation period in seconds
    pub period: u64,
    pub kind: CodeKind,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabHeadCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddLabRequest {
    pub name: String,
    #[serde(default)]
    pub head: Option<LabHeadCredentials>,
}

/// Outcome of a checklist sweep after a catalog change
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Checklists examined
    pub scanned: usize,
    /// Checklists that were changed
    pub patched: usize,
    /// Checklists whose update failed
    pub failed: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabChangeResponse {
    pub name: String,
    pub labs: Vec<String>,
    pub checklists: SyncReport,
    /// False when some downstream step failed after the catalog change was saved
    pub cascade_complete: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabListResponse {
    pub labs: Vec<String>,
}
