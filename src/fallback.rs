use std::{pin::Pin, time::Duration};

use tokio::time::{Instant, Sleep};

/// Session-wide deadline after which completion is forced.
///
/// Fires at most once. Once disarmed or fired, [`FallbackGuard::fired`] never
/// resolves again.
#[derive(Debug)]
pub struct FallbackGuard {
    deadline: Instant,
    timer: Option<Pin<Box<Sleep>>>,
}

impl FallbackGuard {
    pub fn arm(timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            deadline,
            timer: Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn disarm(&mut self) {
        self.timer = None;
    }

    /// Resolves when the deadline passes. Cancel safe: dropping the returned
    /// future keeps the timer armed.
    pub async fn fired(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.timer = None;
            }
            None => std::future::pending().await,
        }
    }
}
