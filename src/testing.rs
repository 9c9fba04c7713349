use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::platform::{Platform, ProcessInfo};
use crate::reporter::{Level, Reporter};

/// Captures report lines for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    pub lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingReporter {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, level: Level, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}

/// Scriptable in-memory stand-in for the OS.
///
/// Existing paths live in a set. Each failure knob makes one capability
/// misbehave. Every mutating call is appended to `calls` so tests can assert
/// ordering across subsystems.
pub struct FakePlatform {
    target: PathBuf,
    pub paths: Mutex<HashSet<PathBuf>>,
    pub procs: Vec<ProcessInfo>,
    pub holders: Vec<u32>,

    pub fail_remove: HashSet<PathBuf>,
    pub fail_remove_all: bool,
    pub fail_shell: HashSet<PathBuf>,
    pub fail_rename: bool,
    pub fail_script: bool,
    pub fail_schedule: bool,
    pub fail_acl: bool,

    pub killed: Mutex<Vec<u32>>,
    pub pending: Mutex<Vec<PathBuf>>,
    pub scripts: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    /// A fake where the target does not exist.
    pub fn new(target: &Path) -> Self {
        Self {
            target: target.to_path_buf(),
            paths: Mutex::new(HashSet::new()),
            procs: Vec::new(),
            holders: Vec::new(),
            fail_remove: HashSet::new(),
            fail_remove_all: false,
            fail_shell: HashSet::new(),
            fail_rename: false,
            fail_script: false,
            fail_schedule: false,
            fail_acl: false,
            killed: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A fake seeded with the target directory and one file inside it.
    pub fn with_target(target: &Path) -> Self {
        let fake = Self::new(target);
        {
            let mut paths = fake.paths.lock().unwrap();
            paths.insert(target.to_path_buf());
            paths.insert(target.join("file.txt"));
        }
        fake
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn remove_subtree(&self, path: &Path) {
        let mut paths = self.paths.lock().unwrap();
        paths.retain(|p| p != path && !p.starts_with(path));
    }

    fn acl_result(&self) -> io::Result<()> {
        if self.fail_acl {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"))
        } else {
            Ok(())
        }
    }
}

impl Platform for FakePlatform {
    fn exists(&self, path: &Path) -> bool {
        self.paths.lock().unwrap().contains(path)
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        self.procs.clone()
    }

    fn lock_holders(&self, _path: &Path) -> Vec<u32> {
        self.holders.clone()
    }

    fn kill_process(&self, pid: u32) -> io::Result<()> {
        self.log(format!("kill:{pid}"));
        if self.procs.iter().any(|p| p.pid == pid) {
            self.killed.lock().unwrap().push(pid);
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such process"))
        }
    }

    fn take_ownership(&self, path: &Path) -> io::Result<()> {
        self.log(format!("take_ownership:{}", path.display()));
        self.acl_result()
    }

    fn grant_full_access(&self, path: &Path) -> io::Result<()> {
        self.log(format!("grant_full_access:{}", path.display()));
        self.acl_result()
    }

    fn clear_attributes(&self, path: &Path) -> io::Result<()> {
        self.log(format!("clear_attributes:{}", path.display()));
        self.acl_result()
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        self.log(format!("remove_tree:{}", path.display()));
        if self.fail_remove_all || self.fail_remove.contains(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "sharing violation"));
        }
        self.remove_subtree(path);
        Ok(())
    }

    fn shell_remove_tree(&self, path: &Path) -> io::Result<()> {
        self.log(format!("shell_remove:{}", path.display()));
        if self.fail_shell.contains(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "rd exited with 145"));
        }
        self.remove_subtree(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.log(format!("rename:{}->{}", from.display(), to.display()));
        if self.fail_rename {
            return Err(io::Error::new(io::ErrorKind::Other, "access denied"));
        }
        let mut paths = self.paths.lock().unwrap();
        let moved: Vec<PathBuf> = paths
            .iter()
            .filter(|p| *p == from || p.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            paths.remove(&old);
            let new = if old == from {
                to.to_path_buf()
            } else {
                to.join(old.strip_prefix(from).unwrap())
            };
            paths.insert(new);
        }
        Ok(())
    }

    fn run_script_elevated(&self, script: &str) -> io::Result<()> {
        self.log("script".to_string());
        self.scripts.lock().unwrap().push(script.to_string());
        if self.fail_script {
            return Err(io::Error::new(io::ErrorKind::Other, "elevation refused"));
        }
        self.remove_subtree(&self.target);
        Ok(())
    }

    fn schedule_delete_on_reboot(&self, path: &Path) -> io::Result<()> {
        self.log(format!("schedule:{}", path.display()));
        if self.fail_schedule {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        self.pending.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
