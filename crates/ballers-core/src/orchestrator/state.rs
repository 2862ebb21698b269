use serde::{Deserialize, Serialize};

/// Estado de una corrida de sincronización.
///
/// Las transiciones válidas son:
/// - `Idle` -> `Fetching`
/// - `Fetching` -> `Reconciling`
/// - `Reconciling` -> `Writing`
/// - `Writing` -> `Done`
/// - cualquier estado no terminal distinto de `Idle` -> `Failed`
///
/// `Done` y `Failed` son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Fetching,
    Reconciling,
    Writing,
    Done,
    Failed,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncState::Done | SyncState::Failed)
    }

    pub fn can_transition_to(self, next: SyncState) -> bool {
        use SyncState::*;
        match (self, next) {
            (Idle, Fetching) | (Fetching, Reconciling) | (Reconciling, Writing) | (Writing, Done) => true,
            (Fetching | Reconciling | Writing, Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Reconciling => "reconciling",
            SyncState::Writing => "writing",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncState::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Idle.can_transition_to(Fetching));
        assert!(Fetching.can_transition_to(Reconciling));
        assert!(Reconciling.can_transition_to(Writing));
        assert!(Writing.can_transition_to(Done));
    }

    #[test]
    fn failed_reachable_from_non_idle_only() {
        assert!(!Idle.can_transition_to(Failed));
        assert!(Fetching.can_transition_to(Failed));
        assert!(Writing.can_transition_to(Failed));
        assert!(!Done.can_transition_to(Failed));
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(!Idle.can_transition_to(Writing));
        assert!(!Writing.can_transition_to(Fetching));
        assert!(!Failed.can_transition_to(Idle));
    }
}
