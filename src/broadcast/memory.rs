//! Process memory sampling for the broadcast watchdog

use sysinfo::{Pid, Process, ProcessesToUpdate, System};

/// Source of the current process's resident memory
pub trait MemoryProbe: Send {
    /// Resident set size in bytes; `None` when the platform cannot report it
    fn resident_bytes(&mut self) -> Option<u64>;
}

/// `sysinfo`-backed probe refreshing only the current process
pub struct SysinfoMemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Cannot determine current pid, memory watchdog disabled: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system.process(pid).map(Process::memory)
    }
}

/// Probe returning a fixed value
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemoryProbe(pub Option<u64>);

impl MemoryProbe for FixedMemoryProbe {
    fn resident_bytes(&mut self) -> Option<u64> {
        self.0
    }
}
