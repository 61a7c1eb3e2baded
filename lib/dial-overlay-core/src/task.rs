use crate::error::{OverlayError, OverlayResult};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ready,
    Failed(String),
}

/// One-shot gate. Starts pending and settles once, either ready or failed.
pub struct Task {
    state: watch::Sender<TaskState>,
}

impl Task {
    pub fn new() -> Self {
        let (state, _) = watch::channel(TaskState::Pending);
        Self { state }
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == TaskState::Ready
    }

    /// Resolves `Ok(true)` once ready. Fails if the task failed, before or while waiting.
    pub async fn ready(&self) -> OverlayResult<bool> {
        let mut receiver = self.state.subscribe();
        let state = receiver
            .wait_for(|state| *state != TaskState::Pending)
            .await
            .map_err(|_| OverlayError::Closed)?
            .clone();

        match state {
            TaskState::Failed(reason) => Err(OverlayError::TaskFailed(reason)),
            _ => Ok(true),
        }
    }

    /// Returns true if this call moved the task out of pending.
    pub fn complete(&self) -> bool {
        self.settle(TaskState::Ready)
    }

    /// Returns true if this call moved the task out of pending.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.settle(TaskState::Failed(reason.into()))
    }

    fn settle(&self, next: TaskState) -> bool {
        self.state.send_if_modified(|state| {
            if *state != TaskState::Pending {
                return false;
            }
            *state = next;
            true
        })
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready_waits_for_complete() {
        let task = Arc::new(Task::new());
        let waiter = tokio::spawn({
            let task = task.clone();
            async move { task.ready().await }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        assert!(task.complete());
        assert!(waiter.await.unwrap().unwrap());
        // Already ready resolves immediately
        assert!(task.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_releases_waiters() {
        let task = Arc::new(Task::new());
        let waiter = tokio::spawn({
            let task = task.clone();
            async move { task.ready().await }
        });

        tokio::task::yield_now().await;
        assert!(task.fail("destroyed"));

        match waiter.await.unwrap() {
            Err(OverlayError::TaskFailed(reason)) => assert_eq!(reason, "destroyed"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(task.ready().await, Err(OverlayError::TaskFailed(_))));
    }

    #[test]
    fn test_settled_task_ignores_transitions() {
        let task = Task::new();
        assert_eq!(task.state(), TaskState::Pending);

        assert!(task.complete());
        assert!(!task.complete());
        assert!(!task.fail("too late"));
        assert_eq!(task.state(), TaskState::Ready);

        let failed = Task::new();
        assert!(failed.fail("gone"));
        assert!(!failed.complete());
        assert_eq!(failed.state(), TaskState::Failed("gone".to_string()));
    }
}
