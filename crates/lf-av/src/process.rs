//! Job-scoped registry of in-flight engine processes.
//!
//! Every engine invocation registers itself before spawning and holds the
//! returned [`ProcessHandle`] until it finishes. Aborting a job calls
//! [`ProcessRegistry::kill_all`], which signals every registered process and
//! seals the registry so that nothing new can start.

use std::collections::HashMap;
use std::sync::Arc;

use lf_core::{Error, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    sealed: bool,
    active: HashMap<u64, Entry>,
}

#[derive(Debug)]
struct Entry {
    label: String,
    kill: CancellationToken,
}

/// Registry of running engine processes for one job.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: Mutex<Inner>,
}

impl ProcessRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a process about to be spawned.
    ///
    /// The handle's kill token is a child of `parent`, so cancelling the job
    /// token also reaches the process. Fails with [`Error::Aborted`] once the
    /// registry is sealed or `parent` is cancelled.
    pub fn register(
        self: &Arc<Self>,
        label: impl Into<String>,
        parent: &CancellationToken,
    ) -> Result<ProcessHandle> {
        let mut inner = self.inner.lock();
        if inner.sealed || parent.is_cancelled() {
            return Err(Error::Aborted);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let label = label.into();
        let kill = parent.child_token();
        inner.active.insert(
            id,
            Entry {
                label: label.clone(),
                kill: kill.clone(),
            },
        );
        tracing::debug!(process_id = id, %label, "engine process registered");

        Ok(ProcessHandle {
            id,
            label,
            kill,
            registry: Arc::clone(self),
        })
    }

    /// Signal every registered process, clear the registry and seal it.
    /// Returns how many processes were signalled.
    pub fn kill_all(&self) -> usize {
        let drained: Vec<Entry> = {
            let mut inner = self.inner.lock();
            inner.sealed = true;
            inner.active.drain().map(|(_, e)| e).collect()
        };
        for entry in &drained {
            tracing::info!(label = %entry.label, "terminating engine process");
            entry.kill.cancel();
        }
        drained.len()
    }

    /// Labels of the processes currently registered.
    pub fn active_labels(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut labels: Vec<String> = inner.active.values().map(|e| e.label.clone()).collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.inner.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }
}

/// Registration of one running process. Deregisters on drop.
#[derive(Debug)]
pub struct ProcessHandle {
    id: u64,
    label: String,
    kill: CancellationToken,
    registry: Arc<ProcessRegistry>,
}

impl ProcessHandle {
    /// Token that fires when this process must be killed.
    pub fn token(&self) -> &CancellationToken {
        &self.kill
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.registry.inner.lock().active.remove(&self.id);
    }
}

/// Cancellation state threaded through every engine call of a job.
#[derive(Debug, Clone)]
pub struct RunControl {
    pub cancel: CancellationToken,
    pub processes: Arc<ProcessRegistry>,
}

impl RunControl {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            processes: ProcessRegistry::new(),
        }
    }

    /// Fail fast with [`Error::Aborted`] if the job has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    /// Cancel the job token, then signal and seal the process registry.
    pub fn abort(&self) -> usize {
        self.cancel.cancel();
        self.processes.kill_all()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_drop_deregisters() {
        let reg = ProcessRegistry::new();
        let parent = CancellationToken::new();
        {
            let h = reg.register("merge-audio", &parent).unwrap();
            assert_eq!(h.label(), "merge-audio");
            assert_eq!(reg.len(), 1);
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn kill_all_signals_and_seals() {
        let reg = ProcessRegistry::new();
        let parent = CancellationToken::new();
        let a = reg.register("a", &parent).unwrap();
        let b = reg.register("b", &parent).unwrap();
        assert_eq!(reg.active_labels(), vec!["a", "b"]);

        assert_eq!(reg.kill_all(), 2);
        assert!(a.token().is_cancelled());
        assert!(b.token().is_cancelled());
        assert!(reg.is_empty());
        assert!(reg.is_sealed());
        assert!(!parent.is_cancelled());

        let err = reg.register("c", &parent).unwrap_err();
        assert!(err.is_aborted());
    }

    #[test]
    fn cancelled_parent_blocks_registration() {
        let reg = ProcessRegistry::new();
        let parent = CancellationToken::new();
        parent.cancel();
        assert!(reg.register("late", &parent).is_err());
    }

    #[test]
    fn parent_cancel_reaches_handle() {
        let reg = ProcessRegistry::new();
        let parent = CancellationToken::new();
        let h = reg.register("loop-video", &parent).unwrap();
        parent.cancel();
        assert!(h.token().is_cancelled());
    }

    #[test]
    fn run_control_abort() {
        let control = RunControl::new();
        let h = control.processes.register("x", &control.cancel).unwrap();
        assert!(control.check().is_ok());
        assert_eq!(control.abort(), 1);
        assert!(h.token().is_cancelled());
        assert!(control.check().unwrap_err().is_aborted());
        drop(h);
        assert!(control.processes.is_empty());
    }
}
