//! Liveness check for the game process.

use std::ffi::OsStr;
use std::sync::{Mutex, PoisonError};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Reports whether the process the run loop is tied to is alive.
pub trait ProcessGate: Send + Sync {
    /// Check if the target process is currently running.
    fn is_target_running(&self) -> bool;
}

impl<F> ProcessGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_target_running(&self) -> bool {
        self()
    }
}

/// Process gate backed by the OS process table.
pub struct SystemProcessGate {
    /// Executable name to match exactly.
    process_name: String,

    /// Reused between checks so refreshes stay cheap.
    system: Mutex<System>,
}

impl SystemProcessGate {
    /// Create a gate for an executable name, e.g. `Grim Dawn.exe`.
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            system: Mutex::new(System::new()),
        }
    }

    /// Executable name this gate looks for.
    pub fn process_name(&self) -> &str {
        &self.process_name
    }
}

impl ProcessGate for SystemProcessGate {
    /// Platforms without a process table report "not running", which ends the
    /// run loop instead of spinning forever.
    fn is_target_running(&self) -> bool {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            warn!("Process enumeration is not supported on this platform");
            return false;
        }

        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        let name = OsStr::new(&self.process_name);
        let running = system.processes().values().any(|p| p.name() == name);
        debug!("{} running: {running}", self.process_name);
        running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_closure_gate() {
        let alive = AtomicBool::new(true);
        let gate = || alive.load(Ordering::SeqCst);

        assert!(gate.is_target_running());
        alive.store(false, Ordering::SeqCst);
        assert!(!gate.is_target_running());
    }

    #[test]
    fn test_unknown_process_is_not_running() {
        let gate = SystemProcessGate::new("no-such-process-gdfowsync-12345.exe");
        assert_eq!(gate.process_name(), "no-such-process-gdfowsync-12345.exe");
        assert!(!gate.is_target_running());
    }

    #[test]
    fn test_current_process_is_running() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let Some(me) = system.process(sysinfo::Pid::from_u32(std::process::id())) else {
            return;
        };
        let name = me.name().to_string_lossy().into_owned();

        assert!(SystemProcessGate::new(name).is_target_running());
    }
}
