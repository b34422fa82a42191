use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Plain toast notifications.
pub const TOAST_TIMEOUT: Duration = Duration::from_millis(3000);
/// Application reminder toast.
pub const APPLICATION_TOAST_TIMEOUT: Duration = Duration::from_millis(5000);
/// Delay before an emptied reminder popup closes itself.
pub const EMPTY_POPUP_CLOSE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Visible,
    Dismissed,
}

#[derive(Debug)]
pub struct AutoDismiss {
    deadline: Instant,
    dismissed_early: bool,
    callback: Option<JoinHandle<()>>,
}

impl AutoDismiss {
    pub fn start(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            dismissed_early: false,
            callback: None,
        }
    }

    /// Runs `on_dismiss` when the timeout elapses, unless the popup was
    /// dismissed by hand or dropped first. Must be called inside a tokio
    /// runtime.
    pub fn with_callback<F>(timeout: Duration, on_dismiss: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_dismiss();
        });
        Self {
            deadline,
            dismissed_early: false,
            callback: Some(handle),
        }
    }

    pub fn state(&self) -> PopupState {
        if self.dismissed_early || Instant::now() >= self.deadline {
            PopupState::Dismissed
        } else {
            PopupState::Visible
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state() == PopupState::Visible
    }

    pub fn dismiss(&mut self) {
        if self.is_visible() {
            self.dismissed_early = true;
        }
        self.cancel();
    }

    /// Resolves once the popup is dismissed, by timeout or by hand.
    pub async fn dismissed(&self) {
        if self.dismissed_early {
            return;
        }
        tokio::time::sleep_until(self.deadline).await;
    }

    pub fn remaining(&self) -> Duration {
        if self.dismissed_early {
            return Duration::ZERO;
        }
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.callback.take() {
            handle.abort();
        }
    }
}

impl Drop for AutoDismiss {
    fn drop(&mut self) {
        self.cancel();
    }
}
