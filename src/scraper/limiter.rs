//! Per-host politeness: concurrency caps and minimum request spacing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

struct HostState {
    semaphore: Arc<Semaphore>,
    /// Completion time of the most recent request to this host. Held as a
    /// tokio mutex so waiters queue fairly while spacing out.
    last: tokio::sync::Mutex<Option<Instant>>,
}

/// Enforces per-host concurrency and a minimum delay between successive
/// requests to the same host. Hosts are tracked lazily on first use.
pub struct DomainLimiter {
    per_host_concurrency: usize,
    request_delay: Duration,
    hosts: Mutex<HashMap<String, Arc<HostState>>>,
}

/// Permission to issue one request to a host. Dropping it releases the
/// host concurrency slot.
pub struct HostPermit {
    _permit: OwnedSemaphorePermit,
}

impl DomainLimiter {
    pub fn new(per_host_concurrency: usize, request_delay: Duration) -> Self {
        Self {
            per_host_concurrency: per_host_concurrency.max(1),
            request_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn host_state(&self, host: &str) -> Arc<HostState> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_owned())
            .or_insert_with(|| {
                Arc::new(HostState {
                    semaphore: Arc::new(Semaphore::new(self.per_host_concurrency)),
                    last: tokio::sync::Mutex::new(None),
                })
            })
            .clone()
    }

    /// Wait for a concurrency slot on `host`, then until the request delay
    /// since the previous request to it has elapsed.
    pub async fn acquire(&self, host: &str) -> HostPermit {
        let state = self.host_state(host);

        // Semaphore is never closed, so acquire cannot fail.
        let permit = state
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("limiter semaphore closed"));

        let mut last = state.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        HostPermit { _permit: permit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_request_to_host_waits_out_the_delay() {
        let limiter = DomainLimiter::new(2, Duration::from_millis(500));

        let start = Instant::now();
        let first = limiter.acquire("example.com").await;
        drop(first);
        let _second = limiter.acquire("example.com").await;

        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn different_hosts_do_not_delay_each_other() {
        let limiter = DomainLimiter::new(1, Duration::from_secs(5));

        let start = Instant::now();
        let _a = limiter.acquire("a.com").await;
        let _b = limiter.acquire("b.com").await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn per_host_concurrency_enforced() {
        let limiter = Arc::new(DomainLimiter::new(1, Duration::ZERO));

        let held = limiter.acquire("example.com").await;

        let contender = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _permit = limiter.acquire("example.com").await;
            })
        };

        // The contender cannot make progress while the permit is held.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.expect("contender should finish");
    }
}
