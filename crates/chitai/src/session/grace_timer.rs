//! Idle countdown that ends abandoned sessions.
//!
//! The timer holds a deadline instead of owning a task. The session actor
//! awaits [`GraceTimer::expired`] in its select loop, so expiry is handled in
//! the same serialized path as every inbound command.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub struct GraceTimer {
    period: Duration,
    deadline: Option<Instant>,
    last_refresh: Option<DateTime<Utc>>,
}

impl GraceTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
            last_refresh: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Restart the countdown from now and remember the activity time.
    pub fn refresh(&mut self) {
        self.rearm();
        self.last_refresh = Some(Utc::now());
    }

    /// Restart the countdown without counting it as activity.
    pub fn rearm(&mut self) {
        self.deadline = Some(Instant::now() + self.period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.last_refresh = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wall-clock time of the last activity that refreshed the timer.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Resolves at the deadline. Never resolves while the timer is cancelled.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let timer = GraceTimer::new(Duration::from_secs(5));
        assert!(!timer.is_armed());
        let result = timeout(Duration::from_secs(3600), timer.expired()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_period() {
        let mut timer = GraceTimer::new(Duration::from_secs(5));
        timer.refresh();
        assert!(timer.last_refresh().is_some());

        let result = timeout(Duration::from_secs(4), timer.expired()).await;
        assert!(result.is_err());
        let result = timeout(Duration::from_secs(2), timer.expired()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_pushes_deadline_back() {
        let mut timer = GraceTimer::new(Duration::from_secs(5));
        timer.refresh();
        advance(Duration::from_secs(4)).await;
        timer.refresh();

        let result = timeout(Duration::from_secs(4), timer.expired()).await;
        assert!(result.is_err());
        let result = timeout(Duration::from_secs(2), timer.expired()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_keeps_last_refresh() {
        let mut timer = GraceTimer::new(Duration::from_secs(5));
        timer.refresh();
        let refreshed = timer.last_refresh();
        advance(Duration::from_secs(5)).await;
        timer.rearm();
        assert_eq!(timer.last_refresh(), refreshed);

        timer.cancel();
        assert!(!timer.is_armed());
        assert!(timer.last_refresh().is_none());
    }
}
