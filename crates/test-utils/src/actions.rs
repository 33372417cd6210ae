//! Scripted task actions for tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use chaindag::exec::{TaskAction, action_fn};
use tokio::sync::{Barrier, Notify};

/// Shared, ordered log of what actions did.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    /// Records `name` and succeeds.
    pub fn ok(&self, name: &str) -> Arc<dyn TaskAction> {
        let recorder = self.clone();
        let name = name.to_string();
        action_fn(format!("ok {name}"), move |_ctx| {
            let recorder = recorder.clone();
            let name = name.clone();
            async move {
                recorder.record(name);
                Ok(())
            }
        })
    }

    /// Records `name` and fails with `msg`.
    pub fn fail(&self, name: &str, msg: &str) -> Arc<dyn TaskAction> {
        let recorder = self.clone();
        let name = name.to_string();
        let msg = msg.to_string();
        action_fn(format!("fail {name}"), move |_ctx| {
            let recorder = recorder.clone();
            let name = name.clone();
            let msg = msg.clone();
            async move {
                recorder.record(name);
                bail!("{msg}")
            }
        })
    }
}

pub fn succeed() -> Arc<dyn TaskAction> {
    action_fn("succeed", |_ctx| async { Ok(()) })
}

pub fn fail_with(msg: &str) -> Arc<dyn TaskAction> {
    let msg = msg.to_string();
    action_fn("fail", move |_ctx| {
        let msg = msg.clone();
        async move { bail!("{msg}") }
    })
}

pub fn sleep_for(duration: Duration) -> Arc<dyn TaskAction> {
    action_fn("sleep", move |_ctx| async move {
        tokio::time::sleep(duration).await;
        Ok(())
    })
}

pub fn panics(msg: &'static str) -> Arc<dyn TaskAction> {
    action_fn("panic", move |_ctx| async move {
        if !msg.is_empty() {
            panic!("{msg}");
        }
        Ok(())
    })
}

/// Fails the first `failures` attempts, then succeeds. The counter holds the
/// number of attempts made.
pub fn flaky(failures: u32) -> (Arc<dyn TaskAction>, Arc<AtomicU32>) {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let action = action_fn("flaky", move |_ctx| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n <= failures {
                bail!("attempt {n} failed");
            }
            Ok(())
        }
    });
    (action, attempts)
}

/// Action that signals `started` and then waits for `release`.
///
/// `Notify` keeps a permit, so signalling before anyone waits is fine.
pub fn latch(started: Arc<Notify>, release: Arc<Notify>) -> Arc<dyn TaskAction> {
    action_fn("latch", move |_ctx| {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        async move {
            started.notify_one();
            release.notified().await;
            Ok(())
        }
    })
}

/// Action that signals `started` and then runs until cancelled.
pub fn until_cancelled(started: Arc<Notify>) -> Arc<dyn TaskAction> {
    action_fn("until-cancelled", move |ctx| {
        let started = Arc::clone(&started);
        async move {
            started.notify_one();
            ctx.cancel.cancelled().await;
            bail!("stopped by cancellation")
        }
    })
}

/// Tracks how many gauge actions run at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Action that holds its slot until `rendezvous` releases it.
    ///
    /// With a barrier sized to the concurrency limit, the run only finishes
    /// if that many tasks really run at the same time.
    pub fn action(self: &Arc<Self>, rendezvous: Arc<Barrier>) -> Arc<dyn TaskAction> {
        let gauge = Arc::clone(self);
        action_fn("gauge", move |_ctx| {
            let gauge = Arc::clone(&gauge);
            let rendezvous = Arc::clone(&rendezvous);
            async move {
                let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                rendezvous.wait().await;
                gauge.current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }
}
