//! Fault Hooks
//!
//! Interception points around the consensus lifecycle. Test harnesses
//! install a [`FaultHooks`] implementation to fail or delay any transition
//! without touching production code paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};

/// Lifecycle point at which a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreStart,
    PostStart,
    PreConfigChange,
    PostConfigChange,
    PreReplicate,
    PostReplicate,
    PreUpdate,
    PostUpdate,
    PreShutdown,
    PostShutdown,
}

impl HookPoint {
    /// Every hook point, in lifecycle order
    pub const ALL: [HookPoint; 10] = [
        HookPoint::PreStart,
        HookPoint::PostStart,
        HookPoint::PreConfigChange,
        HookPoint::PostConfigChange,
        HookPoint::PreReplicate,
        HookPoint::PostReplicate,
        HookPoint::PreUpdate,
        HookPoint::PostUpdate,
        HookPoint::PreShutdown,
        HookPoint::PostShutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PreStart => "pre_start",
            HookPoint::PostStart => "post_start",
            HookPoint::PreConfigChange => "pre_config_change",
            HookPoint::PostConfigChange => "post_config_change",
            HookPoint::PreReplicate => "pre_replicate",
            HookPoint::PostReplicate => "post_replicate",
            HookPoint::PreUpdate => "pre_update",
            HookPoint::PostUpdate => "post_update",
            HookPoint::PreShutdown => "pre_shutdown",
            HookPoint::PostShutdown => "post_shutdown",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HookPoint::ALL
            .into_iter()
            .find(|point| point.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown hook point: {}", s)))
    }
}

/// Hooks invoked around lifecycle transitions.
///
/// Every method defaults to success. An error returned from a hook is
/// surfaced by the bracketed operation exactly as returned.
#[async_trait::async_trait]
pub trait FaultHooks: Send + Sync {
    async fn pre_start(&self) -> Result<()> {
        Ok(())
    }
    async fn post_start(&self) -> Result<()> {
        Ok(())
    }
    async fn pre_config_change(&self) -> Result<()> {
        Ok(())
    }
    async fn post_config_change(&self) -> Result<()> {
        Ok(())
    }
    async fn pre_replicate(&self) -> Result<()> {
        Ok(())
    }
    async fn post_replicate(&self) -> Result<()> {
        Ok(())
    }
    async fn pre_update(&self) -> Result<()> {
        Ok(())
    }
    async fn post_update(&self) -> Result<()> {
        Ok(())
    }
    async fn pre_shutdown(&self) -> Result<()> {
        Ok(())
    }
    async fn post_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Action taken when a scripted hook point is reached
#[derive(Debug, Clone)]
enum Fault {
    Fail(String),
    Delay(Duration),
}

/// Scriptable hook registry for tests.
///
/// Points without a scripted fault succeed. Every invocation is counted.
#[derive(Debug)]
pub struct InjectedFaults {
    faults: HashMap<HookPoint, Fault>,
    calls: HashMap<HookPoint, AtomicUsize>,
}

impl InjectedFaults {
    pub fn new() -> Self {
        Self {
            faults: HashMap::new(),
            calls: HookPoint::ALL
                .into_iter()
                .map(|point| (point, AtomicUsize::new(0)))
                .collect(),
        }
    }

    /// Fail `point` with an [`Error::Injected`] carrying `message`
    pub fn fail_at(mut self, point: HookPoint, message: impl Into<String>) -> Self {
        self.faults.insert(point, Fault::Fail(message.into()));
        self
    }

    /// Sleep for `delay` when `point` is reached, then succeed
    pub fn delay_at(mut self, point: HookPoint, delay: Duration) -> Self {
        self.faults.insert(point, Fault::Delay(delay));
        self
    }

    /// Number of times `point` has run
    pub fn calls(&self, point: HookPoint) -> usize {
        self.calls
            .get(&point)
            .map(|count| count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    async fn run(&self, point: HookPoint) -> Result<()> {
        if let Some(count) = self.calls.get(&point) {
            count.fetch_add(1, Ordering::SeqCst);
        }

        match self.faults.get(&point) {
            Some(Fault::Fail(message)) => {
                tracing::debug!("Injecting failure at {}: {}", point, message);
                Err(Error::Injected(message.clone()))
            }
            Some(Fault::Delay(delay)) => {
                tracing::debug!("Injecting {:?} delay at {}", delay, point);
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Default for InjectedFaults {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FaultHooks for InjectedFaults {
    async fn pre_start(&self) -> Result<()> {
        self.run(HookPoint::PreStart).await
    }
    async fn post_start(&self) -> Result<()> {
        self.run(HookPoint::PostStart).await
    }
    async fn pre_config_change(&self) -> Result<()> {
        self.run(HookPoint::PreConfigChange).await
    }
    async fn post_config_change(&self) -> Result<()> {
        self.run(HookPoint::PostConfigChange).await
    }
    async fn pre_replicate(&self) -> Result<()> {
        self.run(HookPoint::PreReplicate).await
    }
    async fn post_replicate(&self) -> Result<()> {
        self.run(HookPoint::PostReplicate).await
    }
    async fn pre_update(&self) -> Result<()> {
        self.run(HookPoint::PreUpdate).await
    }
    async fn post_update(&self) -> Result<()> {
        self.run(HookPoint::PostUpdate).await
    }
    async fn pre_shutdown(&self) -> Result<()> {
        self.run(HookPoint::PreShutdown).await
    }
    async fn post_shutdown(&self) -> Result<()> {
        self.run(HookPoint::PostShutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_point_names_round_trip() {
        for point in HookPoint::ALL {
            assert_eq!(point.as_str().parse::<HookPoint>().unwrap(), point);
        }
        assert!("mid_start".parse::<HookPoint>().is_err());
    }

    #[tokio::test]
    async fn test_default_hooks_succeed() {
        struct Quiet;
        impl FaultHooks for Quiet {}

        let hooks = Quiet;
        assert!(hooks.pre_start().await.is_ok());
        assert!(hooks.post_shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failure_and_counts() {
        let faults = InjectedFaults::new().fail_at(HookPoint::PreReplicate, "replicate refused");

        let err = faults.pre_replicate().await.unwrap_err();
        assert_eq!(err.to_string(), "replicate refused");
        assert!(faults.post_replicate().await.is_ok());

        assert_eq!(faults.calls(HookPoint::PreReplicate), 1);
        assert_eq!(faults.calls(HookPoint::PostReplicate), 1);
        assert_eq!(faults.calls(HookPoint::PreStart), 0);
    }

    #[tokio::test]
    async fn test_injected_delay() {
        let faults = InjectedFaults::new().delay_at(HookPoint::PreUpdate, Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        faults.pre_update().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
