//! Ledger status of a submitted atom, and the once-only resolution of a
//! pending submission.

use crate::error::SubmissionError;
use crate::primitives::Euid;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomStatus {
    #[serde(rename = "DOES_NOT_EXIST")]
    DoesNotExist,
    #[serde(rename = "PENDING_CM_VERIFICATION")]
    PendingConstraintMachineVerification,
    #[serde(rename = "PENDING_DEPENDENCY_VERIFICATION")]
    PendingDependencyVerification,
    #[serde(rename = "MISSING_DEPENDENCY")]
    MissingDependency,
    #[serde(rename = "CONFLICT_LOSER")]
    ConflictLoser,
    #[serde(rename = "EVICTED_INVALID_ATOM")]
    EvictedInvalidAtom,
    #[serde(rename = "EVICTED_FAILED_CM_VERIFICATION")]
    EvictedFailedConstraintMachineVerification,
    #[serde(rename = "EVICTED_CONFLICT_LOSER")]
    EvictedConflictLoser,
    #[serde(rename = "STORED")]
    Stored,
}

impl AtomStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            AtomStatus::DoesNotExist
                | AtomStatus::PendingConstraintMachineVerification
                | AtomStatus::PendingDependencyVerification
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AtomStatus::Stored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AtomStatus::DoesNotExist => "DOES_NOT_EXIST",
            AtomStatus::PendingConstraintMachineVerification => "PENDING_CM_VERIFICATION",
            AtomStatus::PendingDependencyVerification => "PENDING_DEPENDENCY_VERIFICATION",
            AtomStatus::MissingDependency => "MISSING_DEPENDENCY",
            AtomStatus::ConflictLoser => "CONFLICT_LOSER",
            AtomStatus::EvictedInvalidAtom => "EVICTED_INVALID_ATOM",
            AtomStatus::EvictedFailedConstraintMachineVerification => {
                "EVICTED_FAILED_CM_VERIFICATION"
            }
            AtomStatus::EvictedConflictLoser => "EVICTED_CONFLICT_LOSER",
            AtomStatus::Stored => "STORED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl fmt::Display for AtomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of feeding one status event into a [`PendingSubmission`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Pending,
    Resolved(Result<(), SubmissionError>),
}

/// Tracks one submission attempt until it resolves. Resolves at most once;
/// events after that are refused.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    atom_id: Euid,
    history: Vec<AtomStatus>,
    outcome: Option<Result<(), SubmissionError>>,
}

impl PendingSubmission {
    pub fn new(atom_id: Euid) -> Self {
        PendingSubmission {
            atom_id,
            history: Vec::new(),
            outcome: None,
        }
    }

    pub fn atom_id(&self) -> Euid {
        self.atom_id
    }

    pub fn history(&self) -> &[AtomStatus] {
        &self.history
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&Result<(), SubmissionError>> {
        self.outcome.as_ref()
    }

    pub fn observe(
        &mut self,
        status: AtomStatus,
        data: Option<serde_json::Value>,
    ) -> Result<Resolution, SubmissionError> {
        if self.outcome.is_some() {
            return Err(SubmissionError::AlreadyResolved);
        }
        self.history.push(status);
        if !status.is_terminal() {
            return Ok(Resolution::Pending);
        }
        let outcome = if status.is_success() {
            Ok(())
        } else {
            Err(SubmissionError::Rejected { status, data })
        };
        self.outcome = Some(outcome.clone());
        Ok(Resolution::Resolved(outcome))
    }

    /// Resolves with a failure that did not come from the ledger.
    pub fn fail(&mut self, error: SubmissionError) -> Result<Resolution, SubmissionError> {
        if self.outcome.is_some() {
            return Err(SubmissionError::AlreadyResolved);
        }
        self.outcome = Some(Err(error.clone()));
        Ok(Resolution::Resolved(Err(error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Euid {
        crate::primitives::Hash256::of(b"atom").euid()
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(AtomStatus::parse("STORED"), Some(AtomStatus::Stored));
        assert_eq!(
            AtomStatus::parse("EVICTED_FAILED_CM_VERIFICATION"),
            Some(AtomStatus::EvictedFailedConstraintMachineVerification)
        );
        assert_eq!(AtomStatus::parse("stored"), None);
        assert_eq!(AtomStatus::ConflictLoser.to_string(), "CONFLICT_LOSER");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AtomStatus::DoesNotExist.is_terminal());
        assert!(!AtomStatus::PendingDependencyVerification.is_terminal());
        assert!(AtomStatus::MissingDependency.is_terminal());
        assert!(AtomStatus::Stored.is_terminal());
        assert!(AtomStatus::EvictedConflictLoser.is_terminal());
    }

    #[test]
    fn test_stored_resolves_once() {
        let mut pending = PendingSubmission::new(id());
        assert_eq!(
            pending.observe(AtomStatus::PendingConstraintMachineVerification, None),
            Ok(Resolution::Pending)
        );
        assert_eq!(
            pending.observe(AtomStatus::Stored, None),
            Ok(Resolution::Resolved(Ok(())))
        );
        assert_eq!(
            pending.observe(AtomStatus::Stored, None),
            Err(SubmissionError::AlreadyResolved)
        );
        assert_eq!(pending.history().len(), 2);
    }

    #[test]
    fn test_eviction_resolves_as_failure() {
        let mut pending = PendingSubmission::new(id());
        let data = serde_json::json!({"message": "bad"});
        let resolution = pending
            .observe(AtomStatus::EvictedInvalidAtom, Some(data.clone()))
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved(Err(SubmissionError::Rejected {
                status: AtomStatus::EvictedInvalidAtom,
                data: Some(data)
            }))
        );
        assert!(pending.fail(SubmissionError::Cancelled).is_err());
    }
}
