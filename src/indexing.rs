use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::api::types::{ChainStatus, IndexState};
use crate::chat::reconciler::ChatBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl PollPolicy {
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        (self.timeout.as_millis() / interval).max(1) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Continue,
    Ready,
    Failed(String),
    TimedOut,
}

impl PollStep {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStep::Continue)
    }
}

/// Counts status observations against a [`PollPolicy`].
#[derive(Debug, Clone)]
pub struct IndexPoller {
    policy: PollPolicy,
    attempts: u32,
    settled: Option<PollStep>,
}

impl IndexPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            settled: None,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `None` means the status request failed; it is retried like a pending state.
    pub fn observe(&mut self, status: Option<&ChainStatus>, elapsed: Duration) -> PollStep {
        if let Some(settled) = &self.settled {
            return settled.clone();
        }
        self.attempts += 1;

        let step = match status.map(|s| (s.status, s)) {
            Some((Some(IndexState::Ready), _)) => PollStep::Ready,
            Some((None, s)) if s.initialized => PollStep::Ready,
            Some((Some(IndexState::Error), s)) => PollStep::Failed(
                s.message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            _ if self.attempts >= self.policy.max_attempts() || elapsed >= self.policy.timeout => {
                PollStep::TimedOut
            }
            _ => PollStep::Continue,
        };

        if step.is_terminal() {
            log::info!("Index polling settled after {} checks: {:?}", self.attempts, step);
            self.settled = Some(step.clone());
        }
        step
    }
}

/// Slow status calls count against `policy.timeout` through `clock`.
pub async fn poll_until_settled<B, Sl, F, C>(backend: &B, policy: PollPolicy, mut sleep: Sl, clock: C) -> PollStep
where
    B: ChatBackend,
    Sl: FnMut(Duration) -> F,
    F: Future<Output = ()>,
    C: Fn() -> DateTime<Utc>,
{
    let started = clock();
    let mut poller = IndexPoller::new(policy);
    loop {
        sleep(policy.interval).await;
        let status = match backend.chain_status().await {
            Ok(status) => Some(status),
            Err(e) => {
                log::error!("Error checking status: {}", e);
                None
            }
        };
        let elapsed = (clock() - started).to_std().unwrap_or_default();
        let step = poller.observe(status.as_ref(), elapsed);
        if step.is_terminal() {
            return step;
        }
    }
}

/// Short label for the status badge.
pub fn status_label(status: &ChainStatus) -> &'static str {
    match status.status {
        Some(IndexState::Ready) => "Ready",
        Some(IndexState::Initializing) => "Initializing...",
        Some(IndexState::Error) => "Error",
        _ if status.initialized => "Ready",
        _ => "Not initialized",
    }
}
