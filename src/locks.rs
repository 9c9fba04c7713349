use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::platform::{Platform, ProcessInfo};
use crate::reporter::{Level, Reporter};

/// Terminates processes likely to be pinning files under `target`.
///
/// Two passes over one snapshot: processes whose image name contains the
/// target's base name, then processes the OS reports as holding open handles
/// under the tree. Everything here is best effort; a process that exits
/// between enumeration and termination is the outcome we wanted anyway.
pub fn release_target(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) {
    let processes = platform.processes();
    let own_pid = std::process::id();

    let mut doomed: Vec<u32> = Vec::new();
    let mut seen: HashSet<u32> = HashSet::new();

    if let Some(base) = target.file_name().map(|n| n.to_string_lossy().to_lowercase()) {
        for process in &processes {
            if process.pid != own_pid
                && process.name.to_lowercase().contains(&base)
                && seen.insert(process.pid)
            {
                reporter.report(
                    Level::Info,
                    &format!("{} (pid {}) matches the target name", process.name, process.pid),
                );
                doomed.push(process.pid);
            }
        }
    }

    for pid in platform.lock_holders(target) {
        if pid != own_pid && seen.insert(pid) {
            reporter.report(
                Level::Info,
                &format!("pid {pid} holds an open handle under the target"),
            );
            doomed.push(pid);
        }
    }

    for pid in doomed {
        kill_tree(pid, &processes, platform, reporter);
    }
}

/// Terminates a process and its descendants, children before parents, so no
/// orphan outlives the pass.
fn kill_tree(
    root: u32,
    processes: &[ProcessInfo],
    platform: &dyn Platform,
    reporter: &dyn Reporter,
) {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for process in processes {
        children.entry(process.parent_pid).or_default().push(process.pid);
    }

    let mut order = Vec::new();
    collect_post_order(root, &children, &mut order, &mut HashSet::new());

    for pid in order {
        match platform.kill_process(pid) {
            Ok(()) => reporter.report(Level::Info, &format!("terminated pid {pid}")),
            // Usually "no such process": it exited on its own mid-scan.
            Err(e) => reporter.report(Level::Warn, &format!("pid {pid}: {e}")),
        }
    }
}

fn collect_post_order(
    pid: u32,
    children: &HashMap<u32, Vec<u32>>,
    out: &mut Vec<u32>,
    visited: &mut HashSet<u32>,
) {
    // Pid reuse can make the parent graph cyclic.
    if !visited.insert(pid) {
        return;
    }
    if let Some(kids) = children.get(&pid) {
        for &kid in kids {
            collect_post_order(kid, children, out, visited);
        }
    }
    out.push(pid);
}
