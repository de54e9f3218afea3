//! Reconciliation state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Where a target stands in its reconciliation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileState {
    #[default]
    Idle,
    Validating,
    ResourceObtaining,
    ComputingParameters,
    Synchronizing,
    Audited,
    /// Last run failed; a new synchronize or delete may retry
    Failed,
    Deleting,
    ResourceFreeing,
    Removed,
}

impl ReconcileState {
    /// Whether the engine may move from `self` to `next`.
    ///
    /// Validating may fall back to any resting state, which is how a
    /// rejected write restores the state it started from.
    pub fn can_transition_to(self, next: ReconcileState) -> bool {
        use ReconcileState::*;

        matches!(
            (self, next),
            (Idle | Audited | Failed | Removed, Validating)
                | (Idle | Audited | Failed, Deleting)
                | (
                    Validating,
                    ResourceObtaining | ComputingParameters | Idle | Audited | Failed | Removed
                )
                | (ResourceObtaining, ComputingParameters | Failed)
                | (ComputingParameters, Synchronizing | Failed)
                | (Synchronizing, Audited | Failed)
                | (Deleting, ResourceFreeing | Failed)
                | (ResourceFreeing, Removed | Failed)
        )
    }

    /// States a target rests in between runs.
    pub fn is_resting(self) -> bool {
        matches!(
            self,
            ReconcileState::Idle
                | ReconcileState::Audited
                | ReconcileState::Failed
                | ReconcileState::Removed
        )
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileState::Idle => "idle",
            ReconcileState::Validating => "validating",
            ReconcileState::ResourceObtaining => "resource-obtaining",
            ReconcileState::ComputingParameters => "computing-parameters",
            ReconcileState::Synchronizing => "synchronizing",
            ReconcileState::Audited => "audited",
            ReconcileState::Failed => "failed",
            ReconcileState::Deleting => "deleting",
            ReconcileState::ResourceFreeing => "resource-freeing",
            ReconcileState::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Tracked status of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub state: ReconcileState,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Run that last touched the target
    pub run_id: Option<Uuid>,
}

impl TargetStatus {
    pub fn new(state: ReconcileState, run_id: Option<Uuid>) -> Self {
        Self {
            state,
            last_error: None,
            updated_at: Utc::now(),
            run_id,
        }
    }
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self::new(ReconcileState::Idle, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReconcileState::*;

    #[test]
    fn test_deploy_path() {
        let path = [
            Idle,
            Validating,
            ResourceObtaining,
            ComputingParameters,
            Synchronizing,
            Audited,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Validating.can_transition_to(ComputingParameters));
    }

    #[test]
    fn test_delete_path() {
        for from in [Idle, Audited, Failed] {
            assert!(from.can_transition_to(Deleting));
        }
        assert!(Deleting.can_transition_to(ResourceFreeing));
        assert!(ResourceFreeing.can_transition_to(Removed));
        assert!(!Removed.can_transition_to(Deleting));
    }

    #[test]
    fn test_failures_are_retry_eligible() {
        for from in [ResourceObtaining, ComputingParameters, Synchronizing, Deleting] {
            assert!(from.can_transition_to(Failed));
        }
        assert!(Failed.can_transition_to(Validating));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Idle.can_transition_to(Synchronizing));
        assert!(!Audited.can_transition_to(ResourceFreeing));
        assert!(!Synchronizing.can_transition_to(Deleting));
        assert!(!Removed.can_transition_to(Audited));
    }

    #[test]
    fn test_resting_states() {
        assert!(Idle.is_resting());
        assert!(Removed.is_resting());
        assert!(!Synchronizing.is_resting());
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(ComputingParameters).unwrap(),
            "computing-parameters"
        );
        assert_eq!(ComputingParameters.to_string(), "computing-parameters");
    }
}
