//! Per-lab code registry.
//!
//! Every catalog lab owns a booth code and a talk code plus an `activated`
//! flag. The keynote pseudo-lab only owns a talk code. Rotation replaces code
//! values and never touches the flags; activation flips the flags and never
//! touches the values. One lock guards the whole map so a reader never sees a
//! half-rotated pair.

use std::collections::HashMap;

use labpass_common::{CodeKind, KEYNOTE, TALK_LAB};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use rand::Rng;

use crate::error::AppError;
use crate::metrics::{CODES_ROTATED, LABS_ACTIVE};

/// Lowest code value; codes are always six digits
pub const CODE_MIN: u32 = 100_000;
/// Highest code value
pub const CODE_MAX: u32 = 999_999;

/// Which codes a rotation replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationScope {
    All,
    Booth,
    Talk,
}

/// Current state of one lab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabCodes {
    /// Booth code; `None` for the keynote
    pub code: Option<String>,
    pub talk_code: String,
    pub activated: bool,
}

impl LabCodes {
    fn booth() -> Self {
        Self {
            code: Some(generate_code()),
            talk_code: generate_code(),
            activated: false,
        }
    }

    fn keynote() -> Self {
        Self {
            code: None,
            talk_code: generate_code(),
            activated: false,
        }
    }
}

/// Draw a fresh code uniformly from `CODE_MIN..=CODE_MAX`
pub fn generate_code() -> String {
    rand::rng().random_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Process-wide registry of lab codes
#[derive(Debug)]
pub struct CodeRegistry {
    labs: RwLock<HashMap<String, LabCodes>>,
}

impl CodeRegistry {
    /// Create a registry with one entry per lab plus the keynote
    pub fn new<I, S>(labs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map: HashMap<String, LabCodes> = labs
            .into_iter()
            .map(|lab| (lab.into(), LabCodes::booth()))
            .collect();
        map.insert(KEYNOTE.to_string(), LabCodes::keynote());
        Self {
            labs: RwLock::new(map),
        }
    }

    /// Add an entry for a new lab. Returns false if one already exists.
    pub fn insert(&self, lab: &str) -> bool {
        let mut labs = self.labs.write();
        if labs.contains_key(lab) {
            return false;
        }
        labs.insert(lab.to_string(), LabCodes::booth());
        true
    }

    /// Drop a lab's entry. The keynote entry is permanent.
    pub fn remove(&self, lab: &str) -> bool {
        if lab == KEYNOTE {
            return false;
        }
        let removed = self.labs.write().remove(lab).is_some();
        if removed {
            self.publish_active_gauge();
        }
        removed
    }

    pub fn contains(&self, lab: &str) -> bool {
        self.labs.read().contains_key(lab)
    }

    /// Every identifier with an entry, keynote included, sorted
    pub fn labs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.labs.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn activate(&self, lab: &str) -> Result<(), AppError> {
        self.set_activated(lab, true)
    }

    pub fn deactivate(&self, lab: &str) -> Result<(), AppError> {
        self.set_activated(lab, false)
    }

    fn set_activated(&self, lab: &str, activated: bool) -> Result<(), AppError> {
        {
            let mut labs = self.labs.write();
            let entry = labs
                .get_mut(lab)
                .ok_or_else(|| AppError::UnknownLab(lab.to_string()))?;
            entry.activated = activated;
        }
        self.publish_active_gauge();
        Ok(())
    }

    pub fn is_activated(&self, lab: &str) -> bool {
        self.labs.read().get(lab).is_some_and(|l| l.activated)
    }

    /// Labs currently presenting, sorted
    pub fn active_labs(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .labs
            .read()
            .iter()
            .filter(|(_, l)| l.activated)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Current value of one of a lab's codes
    pub fn get_code(&self, lab: &str, kind: CodeKind) -> Result<String, AppError> {
        let labs = self.labs.read();
        let entry = labs
            .get(lab)
            .ok_or_else(|| AppError::UnknownLab(lab.to_string()))?;
        match kind {
            CodeKind::Booth => entry
                .code
                .clone()
                .ok_or_else(|| AppError::InvalidInput(format!("{lab} has no booth code"))),
            CodeKind::Talk => Ok(entry.talk_code.clone()),
        }
    }

    /// Copy of a lab's full state
    pub fn snapshot(&self, lab: &str) -> Option<LabCodes> {
        self.labs.read().get(lab).cloned()
    }

    /// True iff the lab is activated and `submitted` equals its booth code.
    ///
    /// For the `TALK` pseudo-lab the submission is checked against the talk
    /// code of every activated lab instead.
    pub fn check_code(&self, lab: &str, submitted: &str) -> bool {
        if lab == TALK_LAB {
            return self.check_talk_code(submitted);
        }
        self.labs
            .read()
            .get(lab)
            .is_some_and(|l| l.activated && l.code.as_deref() == Some(submitted))
    }

    /// True iff some activated lab currently shows `submitted` as its talk code
    pub fn check_talk_code(&self, submitted: &str) -> bool {
        self.labs
            .read()
            .values()
            .any(|l| l.activated && l.talk_code == submitted)
    }

    /// Regenerate every booth and talk code, activated or not
    pub fn rotate_all(&self) {
        self.rotate(RotationScope::All);
    }

    pub fn rotate(&self, scope: RotationScope) {
        let mut labs = self.labs.write();
        for entry in labs.values_mut() {
            if matches!(scope, RotationScope::All | RotationScope::Booth) {
                if let Some(code) = entry.code.as_mut() {
                    *code = generate_code();
                }
            }
            if matches!(scope, RotationScope::All | RotationScope::Talk) {
                entry.talk_code = generate_code();
            }
        }
        counter!(CODES_ROTATED).increment(1);
    }

    fn publish_active_gauge(&self) {
        let active = self.labs.read().values().filter(|l| l.activated).count();
        gauge!(LABS_ACTIVE).set(active as f64);
    }
}
