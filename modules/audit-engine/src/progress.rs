//! Progress tracker (C6): real-time streaming of audit progress to
//! subscribers, with checkpoint/resume storage and a cooperative
//! cancellation flag per operation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::ProgressError;

/// Bounded per-subscriber queue depth. A slow subscriber drops new steps
/// rather than backing up the whole pipeline.
const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProgressStep {
    pub timestamp: DateTime<Utc>,
    pub step_type: String,
    pub message: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub step_name: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
struct StepInfo {
    current_step: u32,
    total_steps: u32,
    step_name: String,
}

struct OperationState {
    steps: Vec<ProgressStep>,
    subscribers: Vec<mpsc::Sender<ProgressStep>>,
    completed: bool,
    cancelled: bool,
    status: String,
    step_info: StepInfo,
    checkpoint: Option<Value>,
}

impl OperationState {
    fn new(operation_type: &str, total_steps: u32) -> Self {
        Self {
            steps: Vec::new(),
            subscribers: Vec::new(),
            completed: false,
            cancelled: false,
            status: "running".to_string(),
            step_info: StepInfo {
                current_step: 0,
                total_steps,
                step_name: format!("Starting {operation_type}..."),
            },
            checkpoint: None,
        }
    }
}

/// Extra fields an `add_step` call may carry, mirroring the optional
/// keyword arguments the source accepts.
#[derive(Debug, Default, Clone)]
pub struct StepUpdate {
    pub progress_percent: Option<f64>,
    pub current_step: Option<u32>,
    pub step_name: Option<String>,
    pub total_steps: Option<u32>,
}

/// Tracks progress of long-running audit operations for streaming to
/// subscribers, plus checkpoint storage and cancellation flags.
#[derive(Default)]
pub struct ProgressTracker {
    operations: Mutex<HashMap<String, OperationState>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start_operation(&self, operation_id: &str, operation_type: &str, total_steps: u32) {
        let mut operations = self.operations.lock().await;
        operations.insert(operation_id.to_string(), OperationState::new(operation_type, total_steps));
        drop(operations);

        self.add_step(
            operation_id,
            "started",
            &format!("Starting {operation_type}..."),
            Value::Null,
            StepUpdate { current_step: Some(0), total_steps: Some(total_steps), ..Default::default() },
        )
        .await;
        debug!(operation_id, "started operation");
    }

    /// Appends a progress step and pushes it to every live subscriber,
    /// dropping it for any subscriber whose queue is full.
    pub async fn add_step(&self, operation_id: &str, step_type: &str, message: &str, data: Value, update: StepUpdate) {
        let mut operations = self.operations.lock().await;
        let Some(state) = operations.get_mut(operation_id) else {
            return;
        };

        if let Some(v) = update.current_step {
            state.step_info.current_step = v;
        }
        if let Some(v) = &update.step_name {
            state.step_info.step_name = v.clone();
        }
        if let Some(v) = update.total_steps {
            state.step_info.total_steps = v;
        }

        let step = ProgressStep {
            timestamp: Utc::now(),
            step_type: step_type.to_string(),
            message: message.to_string(),
            data,
            progress_percent: update.progress_percent,
            current_step: Some(state.step_info.current_step),
            total_steps: Some(state.step_info.total_steps),
            step_name: Some(state.step_info.step_name.clone()),
            status: state.status.clone(),
        };

        state.steps.push(step.clone());
        state.subscribers.retain(|tx| match tx.try_send(step.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub async fn complete_operation(&self, operation_id: &str, result: Option<Value>) {
        {
            let mut operations = self.operations.lock().await;
            if let Some(state) = operations.get_mut(operation_id) {
                state.completed = true;
            }
        }
        self.add_step(
            operation_id,
            "completed",
            "Operation completed",
            result.unwrap_or(Value::Null),
            StepUpdate { progress_percent: Some(100.0), ..Default::default() },
        )
        .await;
        info!(operation_id, "completed operation");
    }

    pub async fn fail_operation(&self, operation_id: &str, error: &str) {
        {
            let mut operations = self.operations.lock().await;
            if let Some(state) = operations.get_mut(operation_id) {
                state.completed = true;
                state.status = "error".to_string();
            }
        }
        self.add_step(
            operation_id,
            "error",
            &format!("Operation failed: {error}"),
            serde_json::json!({ "status": "error" }),
            StepUpdate::default(),
        )
        .await;
        warn!(operation_id, error, "operation failed");
    }

    /// Subscribes to an operation's progress, replaying every step already
    /// recorded before returning the live receiver.
    pub async fn subscribe(&self, operation_id: &str) -> Result<mpsc::Receiver<ProgressStep>, ProgressError> {
        let mut operations = self.operations.lock().await;
        let state = operations
            .get_mut(operation_id)
            .ok_or_else(|| ProgressError::UnknownOperation(operation_id.to_string()))?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        for step in &state.steps {
            let _ = tx.try_send(step.clone());
        }
        state.subscribers.push(tx);
        Ok(rx)
    }

    pub async fn is_completed(&self, operation_id: &str) -> bool {
        self.operations.lock().await.get(operation_id).map(|s| s.completed).unwrap_or(false)
    }

    pub async fn get_progress(&self, operation_id: &str) -> Vec<ProgressStep> {
        self.operations.lock().await.get(operation_id).map(|s| s.steps.clone()).unwrap_or_default()
    }

    pub async fn cleanup(&self, operation_id: &str) {
        self.operations.lock().await.remove(operation_id);
    }

    pub async fn save_checkpoint(&self, operation_id: &str, checkpoint: Value) {
        if let Some(state) = self.operations.lock().await.get_mut(operation_id) {
            state.checkpoint = Some(checkpoint);
            info!(operation_id, "saved checkpoint");
        }
    }

    pub async fn get_checkpoint(&self, operation_id: &str) -> Option<Value> {
        self.operations.lock().await.get(operation_id).and_then(|s| s.checkpoint.clone())
    }

    pub async fn has_checkpoint(&self, operation_id: &str) -> bool {
        self.operations
            .lock()
            .await
            .get(operation_id)
            .map(|s| s.checkpoint.is_some())
            .unwrap_or(false)
    }

    pub async fn clear_checkpoint(&self, operation_id: &str) {
        if let Some(state) = self.operations.lock().await.get_mut(operation_id) {
            state.checkpoint = None;
        }
    }

    pub async fn cancel_operation(&self, operation_id: &str) {
        {
            let mut operations = self.operations.lock().await;
            if let Some(state) = operations.get_mut(operation_id) {
                state.cancelled = true;
                state.status = "paused".to_string();
            }
        }
        self.add_step(operation_id, "paused", "Operation paused by user", Value::Null, StepUpdate::default()).await;
        info!(operation_id, "cancelled operation");
    }

    pub async fn is_cancelled(&self, operation_id: &str) -> bool {
        self.operations.lock().await.get(operation_id).map(|s| s.cancelled).unwrap_or(false)
    }

    pub async fn reset_cancellation(&self, operation_id: &str) {
        if let Some(state) = self.operations.lock().await.get_mut(operation_id) {
            state.cancelled = false;
            state.status = "running".to_string();
        }
    }

    pub async fn set_status(&self, operation_id: &str, status: &str) {
        {
            let mut operations = self.operations.lock().await;
            if let Some(state) = operations.get_mut(operation_id) {
                state.status = status.to_string();
            }
        }
        self.add_step(
            operation_id,
            "status_change",
            &format!("Status changed to: {status}"),
            serde_json::json!({ "status": status }),
            StepUpdate::default(),
        )
        .await;
    }

    pub async fn get_status(&self, operation_id: &str) -> String {
        self.operations
            .lock()
            .await
            .get(operation_id)
            .map(|s| s.status.clone())
            .unwrap_or_else(|| "idle".to_string())
    }

    /// Marks the operation quota-exceeded without terminating it — the
    /// operation stays resumable once the operator supplies a new key.
    pub async fn set_quota_exceeded(&self, operation_id: &str) {
        {
            let mut operations = self.operations.lock().await;
            if let Some(state) = operations.get_mut(operation_id) {
                state.status = "quota_exceeded".to_string();
            }
        }
        self.add_step(
            operation_id,
            "quota_exceeded",
            "LLM API quota exceeded. Please supply a new API key to continue.",
            serde_json::json!({ "status": "quota_exceeded" }),
            StepUpdate::default(),
        )
        .await;
        warn!(operation_id, "quota exceeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_operation_records_a_started_step() {
        let tracker = ProgressTracker::new();
        tracker.start_operation("op1", "audit", 7).await;
        let steps = tracker.get_progress("op1").await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_type, "started");
    }

    #[tokio::test]
    async fn late_subscriber_receives_full_history() {
        let tracker = ProgressTracker::new();
        tracker.start_operation("op1", "audit", 7).await;
        tracker.add_step("op1", "info", "step two", Value::Null, StepUpdate::default()).await;

        let mut rx = tracker.subscribe("op1").await.unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.step_type, "started");
        assert_eq!(second.message, "step two");
    }

    #[tokio::test]
    async fn cancellation_flag_round_trips() {
        let tracker = ProgressTracker::new();
        tracker.start_operation("op1", "audit", 7).await;
        assert!(!tracker.is_cancelled("op1").await);
        tracker.cancel_operation("op1").await;
        assert!(tracker.is_cancelled("op1").await);
        tracker.reset_cancellation("op1").await;
        assert!(!tracker.is_cancelled("op1").await);
    }

    #[tokio::test]
    async fn checkpoint_round_trips() {
        let tracker = ProgressTracker::new();
        tracker.start_operation("op1", "audit", 7).await;
        assert!(!tracker.has_checkpoint("op1").await);
        tracker.save_checkpoint("op1", serde_json::json!({"phase": "enrichment"})).await;
        assert!(tracker.has_checkpoint("op1").await);
        let checkpoint = tracker.get_checkpoint("op1").await.unwrap();
        assert_eq!(checkpoint["phase"], "enrichment");
        tracker.clear_checkpoint("op1").await;
        assert!(!tracker.has_checkpoint("op1").await);
    }

    #[tokio::test]
    async fn subscribe_to_unknown_operation_errors() {
        let tracker = ProgressTracker::new();
        assert!(tracker.subscribe("missing").await.is_err());
    }

    #[tokio::test]
    async fn completing_marks_operation_done() {
        let tracker = ProgressTracker::new();
        tracker.start_operation("op1", "audit", 1).await;
        assert!(!tracker.is_completed("op1").await);
        tracker.complete_operation("op1", None).await;
        assert!(tracker.is_completed("op1").await);
    }
}
