use super::state_manager::WorkflowState;

/// Receives every state the workflow enters
pub trait EventSink: Send + Sync {
    fn emit(&self, state: &WorkflowState);
}
