mod coordinator;
mod error;
pub mod events;
mod state_manager;

pub use coordinator::{Coordinator, CoordinatorError};
pub use error::{FailureKind, WorkflowError};
pub use events::EventSink;
pub use state_manager::{
    TransitionRejection, TransitionResult, WorkflowEvent, WorkflowState, WorkflowStateManager,
};
