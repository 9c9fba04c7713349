use std::io;
use std::path::Path;

/// A process observed in one snapshot of the system process table.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
}

/// The OS surface the purge pipeline runs against.
///
/// Every destructive operation goes through this trait so the chain can be
/// driven against an in-memory fake; the real implementation is
/// `win::WinPlatform`.
pub trait Platform {
    /// Post-check used after every strategy attempt.
    fn exists(&self, path: &Path) -> bool;

    /// Snapshot of the process table. Best effort; may be empty.
    fn processes(&self) -> Vec<ProcessInfo>;

    /// Pids holding open handles on files under `path`. Best effort;
    /// processes the caller cannot inspect are skipped.
    fn lock_holders(&self, path: &Path) -> Vec<u32>;

    /// Forcibly terminate one process. "Already exited" surfaces as an error
    /// the caller treats as benign.
    fn kill_process(&self, pid: u32) -> io::Result<()>;

    fn take_ownership(&self, path: &Path) -> io::Result<()>;
    fn grant_full_access(&self, path: &Path) -> io::Result<()>;
    fn clear_attributes(&self, path: &Path) -> io::Result<()>;

    /// Native recursive removal.
    fn remove_tree(&self, path: &Path) -> io::Result<()>;

    /// Forced recursive removal through the OS shell.
    fn shell_remove_tree(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Write `script` to a temporary batch file and run it elevated,
    /// blocking until it exits.
    fn run_script_elevated(&self, script: &str) -> io::Result<()>;

    /// Register `path` (contents first, root last) for deletion during the
    /// next boot. Appends to the pending list, never overwrites it.
    fn schedule_delete_on_reboot(&self, path: &Path) -> io::Result<()>;
}
