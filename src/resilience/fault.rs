use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Decides whether a simulated downstream call fails transiently.
pub trait FaultInjector: Send + Sync {
    fn should_fail(&self, operation: &str) -> bool;
}

/// Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&self, _operation: &str) -> bool {
        false
    }
}

/// Fails with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomFaults {
    probability: f64,
}

impl RandomFaults {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl FaultInjector for RandomFaults {
    fn should_fail(&self, _operation: &str) -> bool {
        rand::random::<f64>() < self.probability
    }
}

/// Replays a fixed sequence of outcomes, then stops failing.
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    script: Mutex<VecDeque<bool>>,
    calls: AtomicU32,
}

impl ScriptedFaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls fail.
    pub fn failing(count: usize) -> Self {
        Self::from_script(std::iter::repeat(true).take(count))
    }

    pub fn from_script(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of simulated calls observed so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaultInjector for ScriptedFaults {
    fn should_fail(&self, _operation: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(false)
    }
}
