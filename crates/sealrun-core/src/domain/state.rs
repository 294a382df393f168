//! State - 1 回の run のライフサイクル
//!
//! Stages run strictly in order. PostProcessing is reachable from every
//! earlier stage so that cleanup always happens.

use super::errors::{Result, SidecarError};

/// TaskState はジョブの進行状態
///
/// # 状態遷移
/// - created → pre_processing → executing → post_processing → done
/// - pre_processing / executing で失敗した場合も post_processing に進む
/// - post_processing → failed（捕捉済みの失敗がある場合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    PreProcessing,
    Executing,
    PostProcessing,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    fn can_advance_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Created, PreProcessing)
                | (PreProcessing, Executing)
                | (PreProcessing, PostProcessing)
                | (Executing, PostProcessing)
                | (PostProcessing, Done)
                | (PostProcessing, Failed)
        )
    }

    /// Move to `next`, rejecting anything outside the lifecycle above.
    pub fn advance(&mut self, next: TaskState) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(SidecarError::Precondition(format!(
                "illegal task state transition {self:?} -> {next:?}"
            )));
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn happy_path_reaches_done() {
        let mut state = TaskState::Created;
        state.advance(TaskState::PreProcessing).unwrap();
        state.advance(TaskState::Executing).unwrap();
        state.advance(TaskState::PostProcessing).unwrap();
        state.advance(TaskState::Done).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn pre_processing_failure_skips_execution() {
        let mut state = TaskState::PreProcessing;
        state.advance(TaskState::PostProcessing).unwrap();
        state.advance(TaskState::Failed).unwrap();
        assert_eq!(state, TaskState::Failed);
    }

    #[rstest]
    #[case(TaskState::Created, TaskState::Executing)]
    #[case(TaskState::Executing, TaskState::Done)]
    #[case(TaskState::Done, TaskState::PreProcessing)]
    #[case(TaskState::Failed, TaskState::PostProcessing)]
    fn illegal_transitions_are_rejected(#[case] from: TaskState, #[case] to: TaskState) {
        let mut state = from;
        let err = state.advance(to).unwrap_err();
        assert!(err.to_string().contains("illegal task state transition"));
        assert_eq!(state, from);
    }
}
