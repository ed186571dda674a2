//! Viewer lifecycle: a one-shot capability gate on the way up and an ordered
//! teardown on the way down.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Running,
    Disposed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move viewer from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
    #[error("3D viewer not available: {0}")]
    Unavailable(String),
}

/// Teardown steps, invoked by [`Lifecycle::dispose`] in declaration order.
pub trait ViewerResources {
    fn cancel_frame_request(&mut self);
    fn detach_input(&mut self);
    fn release_gpu(&mut self);
    fn remove_labels(&mut self);
}

#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
    unavailable: Option<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            unavailable: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }

    /// Records a failed capability probe. The viewer stays uninitialized and
    /// never retries.
    pub fn mark_unavailable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("3D viewer not available: {reason}");
        self.unavailable = Some(reason);
    }

    pub fn begin_initializing(&mut self) -> Result<(), LifecycleError> {
        if let Some(reason) = &self.unavailable {
            return Err(LifecycleError::Unavailable(reason.clone()));
        }
        self.transition(Phase::Uninitialized, Phase::Initializing)
    }

    pub fn start_running(&mut self) -> Result<(), LifecycleError> {
        self.transition(Phase::Initializing, Phase::Running)
    }

    pub fn frame_allowed(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Tears everything down once. Returns false if already disposed.
    pub fn dispose(&mut self, resources: &mut impl ViewerResources) -> bool {
        let from = self.phase;
        if from == Phase::Disposed {
            return false;
        }
        self.phase = Phase::Disposed;
        if matches!(from, Phase::Initializing | Phase::Running) {
            resources.cancel_frame_request();
            resources.detach_input();
            resources.release_gpu();
            resources.remove_labels();
        }
        log::info!("Viewer {from} -> disposed");
        true
    }

    fn transition(&mut self, from: Phase, to: Phase) -> Result<(), LifecycleError> {
        if self.phase != from {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        log::info!("Viewer {from} -> {to}");
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl ViewerResources for Recorder {
        fn cancel_frame_request(&mut self) {
            self.calls.push("cancel_frame_request");
        }
        fn detach_input(&mut self) {
            self.calls.push("detach_input");
        }
        fn release_gpu(&mut self) {
            self.calls.push("release_gpu");
        }
        fn remove_labels(&mut self) {
            self.calls.push("remove_labels");
        }
    }

    #[test]
    fn happy_path_and_ordered_teardown() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.frame_allowed());
        lifecycle.begin_initializing().unwrap();
        assert!(!lifecycle.frame_allowed());
        lifecycle.start_running().unwrap();
        assert!(lifecycle.frame_allowed());

        let mut resources = Recorder::default();
        assert!(lifecycle.dispose(&mut resources));
        assert_eq!(
            resources.calls,
            vec![
                "cancel_frame_request",
                "detach_input",
                "release_gpu",
                "remove_labels"
            ]
        );
        assert_eq!(lifecycle.phase(), Phase::Disposed);
        assert!(!lifecycle.frame_allowed());

        assert!(!lifecycle.dispose(&mut resources));
        assert_eq!(resources.calls.len(), 4);
    }

    #[test]
    fn failed_probe_is_a_stable_state() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_unavailable("no adapter");
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);
        assert_eq!(lifecycle.unavailable_reason(), Some("no adapter"));
        assert!(matches!(
            lifecycle.begin_initializing(),
            Err(LifecycleError::Unavailable(_))
        ));
        assert!(!lifecycle.frame_allowed());

        let mut resources = Recorder::default();
        assert!(lifecycle.dispose(&mut resources));
        assert!(resources.calls.is_empty());
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut lifecycle = Lifecycle::new();
        assert!(matches!(
            lifecycle.start_running(),
            Err(LifecycleError::InvalidTransition {
                from: Phase::Uninitialized,
                to: Phase::Running
            })
        ));
        lifecycle.begin_initializing().unwrap();
        assert!(lifecycle.begin_initializing().is_err());

        lifecycle.dispose(&mut Recorder::default());
        assert!(lifecycle.start_running().is_err());
        assert!(lifecycle.begin_initializing().is_err());
    }

    #[test]
    fn dispose_while_initializing_still_releases() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_initializing().unwrap();
        let mut resources = Recorder::default();
        lifecycle.dispose(&mut resources);
        assert_eq!(resources.calls.len(), 4);
    }
}
