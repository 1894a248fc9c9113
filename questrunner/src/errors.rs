use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element reference is stale: {0}")]
    StaleElement(String),

    #[error("Click was intercepted by another element: {0}")]
    ClickIntercepted(String),

    #[error("Element is not interactable: {0}")]
    ElementNotInteractable(String),

    #[error("No such window: {0}")]
    NoSuchWindow(String),

    /// The original window could not be restored after a spawned window was handled.
    #[error("Lost track of the active window: {0}")]
    WindowLost(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Browser session could not be created: {0}")]
    SessionNotCreated(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How far a failure is allowed to travel before it is absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Consumes one attempt; the task is retried.
    Transient,
    /// The UI refuses input on this element; retrying cannot help.
    NotInteractable,
    /// Aborts the current task group but not the run.
    GroupFatal,
    /// Session integrity is gone; aborts every remaining stage of the run.
    RunFatal,
}

impl AutomationError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AutomationError::ElementNotInteractable(_) => FailureKind::NotInteractable,
            AutomationError::WindowLost(_) => FailureKind::RunFatal,
            AutomationError::Navigation(_)
            | AutomationError::SessionNotCreated(_)
            | AutomationError::NoSuchWindow(_) => FailureKind::GroupFatal,
            AutomationError::ElementNotFound(_)
            | AutomationError::Timeout(_)
            | AutomationError::StaleElement(_)
            | AutomationError::ClickIntercepted(_)
            | AutomationError::InvalidSelector(_)
            | AutomationError::InvalidArgument(_)
            | AutomationError::PlatformError(_)
            | AutomationError::Internal(_) => FailureKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.failure_kind() == FailureKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            AutomationError::StaleElement("card".into()).failure_kind(),
            FailureKind::Transient
        );
        assert_eq!(
            AutomationError::ClickIntercepted("card".into()).failure_kind(),
            FailureKind::Transient
        );
        assert_eq!(
            AutomationError::ElementNotInteractable("card".into()).failure_kind(),
            FailureKind::NotInteractable
        );
        assert_eq!(
            AutomationError::Navigation("dashboard".into()).failure_kind(),
            FailureKind::GroupFatal
        );
        assert_eq!(
            AutomationError::WindowLost("main".into()).failure_kind(),
            FailureKind::RunFatal
        );
        assert!(AutomationError::Timeout("x".into()).is_retryable());
        assert!(!AutomationError::WindowLost("x".into()).is_retryable());
    }
}
