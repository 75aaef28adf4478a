//! Workflow State Machine - Single source of truth for valid state transitions
//!
//! State diagram:
//! ```text
//! Idle ──SelectImage──> Uploading ──UploadComplete──> Generating ──JobSucceeded──> Downloading
//!  ↑                   (progress)                         │                            │
//!  │                                                      └──AssetReady──> Ready <──AssetReady
//!  │                                                                         │
//!  ├──────────────────────────── Acknowledge ────────────────────────────────┘
//!  └──Acknowledge── Failed <──Fail── (any state except Failed)
//! ```
//!
//! Generating goes straight to Ready when the model is not downloaded.
//! SelectImage is only accepted from Idle or Ready, so a second run cannot
//! start while one is in flight.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::assets::MaterializedAsset;

use super::error::FailureKind;
use super::events::EventSink;

/// Events that can trigger state transitions
#[derive(Debug, Clone, PartialEq, strum::Display)]
pub enum WorkflowEvent {
    /// User picked an image and a run should start
    SelectImage,
    /// Upload reached the given fraction
    UploadProgress(f32),
    /// Upload finished and the job is being generated
    UploadComplete,
    /// Generation finished and the model is being downloaded
    JobSucceeded,
    /// The model is ready for display
    AssetReady(MaterializedAsset),
    /// A step failed
    Fail { kind: FailureKind, message: String },
    /// User dismissed the result or error
    Acknowledge,
}

/// Workflow states, exactly one active at a time
#[derive(Debug, Clone, PartialEq, Serialize, strum::Display)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum WorkflowState {
    /// Waiting for an image
    Idle,
    /// Image is being uploaded
    Uploading { progress: f32 },
    /// Job submitted, waiting for the service
    Generating,
    /// Model is being downloaded and verified
    Downloading,
    /// Model available for display
    Ready { asset: MaterializedAsset },
    /// Run ended with an error
    Failed { kind: FailureKind, message: String },
}

/// Result of a successful state transition
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// State changed
    Changed {
        from: WorkflowState,
        to: WorkflowState,
    },
    /// Event was valid but state didn't change
    Unchanged,
}

/// Reason a transition was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{attempted_event} event rejected in {current_state} state")]
pub struct TransitionRejection {
    pub current_state: WorkflowState,
    pub attempted_event: WorkflowEvent,
}

/// Workflow state record shared between the coordinator and display surfaces
pub struct WorkflowStateManager {
    state: watch::Sender<WorkflowState>,
    sink: Arc<dyn EventSink>,
}

impl WorkflowStateManager {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self { state, sink }
    }

    /// Get the current state
    pub fn current(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Attempt a state transition based on an event
    ///
    /// This is the ONLY way to change state. The check, the update and the
    /// sink emission happen under one lock, so racing callers cannot both win
    /// and sinks see states in the order they were entered. Sinks must not
    /// call back into the manager.
    pub fn transition(
        &self,
        event: WorkflowEvent,
    ) -> Result<TransitionResult, TransitionRejection> {
        let mut outcome = Ok(TransitionResult::Unchanged);

        self.state.send_if_modified(|state| match compute_transition(state, &event) {
            Some(next) if next == *state => false,
            Some(next) => {
                let from = std::mem::replace(state, next.clone());
                self.sink.emit(&next);
                outcome = Ok(TransitionResult::Changed { from, to: next });
                true
            }
            None => {
                outcome = Err(TransitionRejection {
                    current_state: state.clone(),
                    attempted_event: event.clone(),
                });
                false
            }
        });

        outcome
    }
}

/// Pure function: compute what transition should happen (if any)
/// Returns None if the transition is invalid
fn compute_transition(current: &WorkflowState, event: &WorkflowEvent) -> Option<WorkflowState> {
    match (current, event) {
        (WorkflowState::Idle | WorkflowState::Ready { .. }, WorkflowEvent::SelectImage) => {
            Some(WorkflowState::Uploading { progress: 0.0 })
        }

        (WorkflowState::Uploading { progress }, WorkflowEvent::UploadProgress(next)) => {
            if next.is_nan() {
                return Some(WorkflowState::Uploading {
                    progress: *progress,
                });
            }
            Some(WorkflowState::Uploading {
                progress: next.clamp(0.0, 1.0),
            })
        }

        (WorkflowState::Uploading { .. }, WorkflowEvent::UploadComplete) => {
            Some(WorkflowState::Generating)
        }

        (WorkflowState::Generating, WorkflowEvent::JobSucceeded) => {
            Some(WorkflowState::Downloading)
        }

        // Direct reference skips Downloading
        (
            WorkflowState::Generating | WorkflowState::Downloading,
            WorkflowEvent::AssetReady(asset),
        ) => Some(WorkflowState::Ready {
            asset: asset.clone(),
        }),

        (WorkflowState::Failed { .. }, WorkflowEvent::Fail { .. }) => None,
        (_, WorkflowEvent::Fail { kind, message }) => Some(WorkflowState::Failed {
            kind: *kind,
            message: message.clone(),
        }),

        (WorkflowState::Failed { .. } | WorkflowState::Ready { .. }, WorkflowEvent::Acknowledge) => {
            Some(WorkflowState::Idle)
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::events::tests::RecordingSink;

    fn asset() -> MaterializedAsset {
        MaterializedAsset {
            source_url: "https://replicate.delivery/out.glb".to_string(),
            local_path: None,
            byte_length: 0,
            verified: false,
            sha256: None,
        }
    }

    fn failed() -> WorkflowState {
        WorkflowState::Failed {
            kind: FailureKind::Upload,
            message: "nope".to_string(),
        }
    }

    fn fail_event() -> WorkflowEvent {
        WorkflowEvent::Fail {
            kind: FailureKind::Timeout,
            message: "too slow".to_string(),
        }
    }

    #[test]
    fn test_valid_transitions() {
        let test_cases = vec![
            (
                "select from idle",
                WorkflowState::Idle,
                WorkflowEvent::SelectImage,
                WorkflowState::Uploading { progress: 0.0 },
            ),
            (
                "select after finished run",
                WorkflowState::Ready { asset: asset() },
                WorkflowEvent::SelectImage,
                WorkflowState::Uploading { progress: 0.0 },
            ),
            (
                "progress update",
                WorkflowState::Uploading { progress: 0.1 },
                WorkflowEvent::UploadProgress(0.5),
                WorkflowState::Uploading { progress: 0.5 },
            ),
            (
                "progress is clamped",
                WorkflowState::Uploading { progress: 0.1 },
                WorkflowEvent::UploadProgress(1.7),
                WorkflowState::Uploading { progress: 1.0 },
            ),
            (
                "upload complete",
                WorkflowState::Uploading { progress: 1.0 },
                WorkflowEvent::UploadComplete,
                WorkflowState::Generating,
            ),
            (
                "job succeeded",
                WorkflowState::Generating,
                WorkflowEvent::JobSucceeded,
                WorkflowState::Downloading,
            ),
            (
                "downloaded asset ready",
                WorkflowState::Downloading,
                WorkflowEvent::AssetReady(asset()),
                WorkflowState::Ready { asset: asset() },
            ),
            (
                "direct asset ready",
                WorkflowState::Generating,
                WorkflowEvent::AssetReady(asset()),
                WorkflowState::Ready { asset: asset() },
            ),
            (
                "fail while generating",
                WorkflowState::Generating,
                fail_event(),
                WorkflowState::Failed {
                    kind: FailureKind::Timeout,
                    message: "too slow".to_string(),
                },
            ),
            (
                "fail from idle",
                WorkflowState::Idle,
                fail_event(),
                WorkflowState::Failed {
                    kind: FailureKind::Timeout,
                    message: "too slow".to_string(),
                },
            ),
            (
                "acknowledge failure",
                failed(),
                WorkflowEvent::Acknowledge,
                WorkflowState::Idle,
            ),
            (
                "dismiss result",
                WorkflowState::Ready { asset: asset() },
                WorkflowEvent::Acknowledge,
                WorkflowState::Idle,
            ),
        ];

        for (description, from, event, expected) in test_cases {
            assert_eq!(
                compute_transition(&from, &event),
                Some(expected),
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_rejected_transitions() {
        let test_cases = vec![
            (
                "select while uploading",
                WorkflowState::Uploading { progress: 0.3 },
                WorkflowEvent::SelectImage,
            ),
            (
                "select while generating",
                WorkflowState::Generating,
                WorkflowEvent::SelectImage,
            ),
            (
                "select while downloading",
                WorkflowState::Downloading,
                WorkflowEvent::SelectImage,
            ),
            (
                "select before acknowledging",
                failed(),
                WorkflowEvent::SelectImage,
            ),
            (
                "progress outside upload",
                WorkflowState::Generating,
                WorkflowEvent::UploadProgress(0.5),
            ),
            (
                "skip upload",
                WorkflowState::Idle,
                WorkflowEvent::UploadComplete,
            ),
            (
                "skip generation",
                WorkflowState::Uploading { progress: 1.0 },
                WorkflowEvent::JobSucceeded,
            ),
            (
                "ready from idle",
                WorkflowState::Idle,
                WorkflowEvent::AssetReady(asset()),
            ),
            (
                "fail twice",
                failed(),
                fail_event(),
            ),
            (
                "acknowledge mid-run",
                WorkflowState::Generating,
                WorkflowEvent::Acknowledge,
            ),
        ];

        for (description, from, event) in test_cases {
            assert_eq!(compute_transition(&from, &event), None, "{}", description);
        }
    }

    #[test]
    fn test_nan_progress_keeps_previous_value() {
        assert_eq!(
            compute_transition(
                &WorkflowState::Uploading { progress: 0.4 },
                &WorkflowEvent::UploadProgress(f32::NAN)
            ),
            Some(WorkflowState::Uploading { progress: 0.4 })
        );
    }

    #[test]
    fn test_manager_emits_only_on_change() {
        let sink = Arc::new(RecordingSink::default());
        let manager = WorkflowStateManager::new(sink.clone());

        assert!(matches!(
            manager.transition(WorkflowEvent::SelectImage),
            Ok(TransitionResult::Changed { .. })
        ));
        assert_eq!(
            manager.transition(WorkflowEvent::UploadProgress(0.0)),
            Ok(TransitionResult::Unchanged)
        );

        let rejection = manager.transition(WorkflowEvent::SelectImage).unwrap_err();
        assert_eq!(
            rejection.to_string(),
            "SelectImage event rejected in Uploading state"
        );
        assert_eq!(manager.current(), WorkflowState::Uploading { progress: 0.0 });

        assert_eq!(
            sink.states(),
            vec![WorkflowState::Uploading { progress: 0.0 }]
        );
    }

    #[test]
    fn test_sink_order_matches_state_order_under_contention() {
        let sink = Arc::new(RecordingSink::default());
        let manager = Arc::new(WorkflowStateManager::new(sink.clone()));
        manager.transition(WorkflowEvent::SelectImage).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for step in 1..=250 {
                        let progress = (step * 4 + worker) as f32 / 1000.0;
                        let _ = manager.transition(WorkflowEvent::UploadProgress(progress));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let held = manager.current();
        manager.transition(WorkflowEvent::UploadComplete).unwrap();

        let states = sink.states();
        assert_eq!(states.last(), Some(&WorkflowState::Generating));
        assert_eq!(states.get(states.len() - 2), Some(&held));
        for pair in states.windows(2) {
            assert_ne!(pair[0], pair[1], "duplicate emission");
        }
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(WorkflowState::Uploading { progress: 0.5 }).unwrap();
        assert_eq!(json["state"], "uploading");
        assert_eq!(json["progress"], 0.5);

        let json = serde_json::to_value(WorkflowState::Failed {
            kind: FailureKind::InvalidAsset,
            message: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["kind"], "invalidAsset");
    }
}
