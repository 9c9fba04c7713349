use std::path::Path;

use crate::platform::Platform;
use crate::reporter::{Level, Reporter};
use crate::strategy::{self, ChainResult};
use crate::{acl, locks};

/// Final status of one purge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The target is confirmed gone right now.
    FullySucceeded,
    /// The OS accepted a reboot-time deletion; the target survives until then.
    ScheduledForReboot,
    /// Every strategy failed, including reboot scheduling.
    Failed,
}

pub struct Engine;

impl Engine {
    /// The whole pipeline: unlock, own, destroy.
    pub fn run(
        target: &Path,
        platform: &dyn Platform,
        reporter: &dyn Reporter,
        dry_run: bool,
    ) -> PurgeOutcome {
        // Already satisfied: nothing runs, not even a single strategy.
        if !platform.exists(target) {
            reporter.report(Level::Success, "target does not exist, nothing to purge");
            return PurgeOutcome::FullySucceeded;
        }

        if dry_run {
            return Self::plan(target, platform, reporter);
        }

        reporter.report(Level::Stage, &format!("purging {}", target.display()));

        // 1. Terminate anything pinning files under the target.
        reporter.report(Level::Stage, "resolving processes holding the target");
        locks::release_target(target, platform, reporter);

        // 2. Make sure permissions cannot be the reason a stage fails.
        acl::normalize(target, platform, reporter);

        // 3. Walk the fallback chain.
        match strategy::run_chain(target, platform, reporter) {
            ChainResult::Removed => {
                reporter.report(Level::Success, "target purged completely");
                PurgeOutcome::FullySucceeded
            }
            ChainResult::Scheduled => {
                reporter.report(
                    Level::Warn,
                    "target could not be removed now; it will be deleted during the next boot",
                );
                PurgeOutcome::ScheduledForReboot
            }
            ChainResult::Exhausted => {
                reporter.report(Level::Error, "all strategies failed, the target survives");
                PurgeOutcome::Failed
            }
        }
    }

    /// Read-only preview of the run: what would be terminated, what would be
    /// attempted. Touches nothing.
    fn plan(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) -> PurgeOutcome {
        reporter.report(Level::Stage, "dry run, nothing will be modified");

        let base = target
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        for process in platform.processes() {
            if !base.is_empty() && process.name.to_lowercase().contains(&base) {
                reporter.report(
                    Level::Info,
                    &format!("would terminate {} (pid {})", process.name, process.pid),
                );
            }
        }
        for pid in platform.lock_holders(target) {
            reporter.report(
                Level::Info,
                &format!("would terminate pid {pid} (open handle under the target)"),
            );
        }
        for (index, s) in strategy::CHAIN.iter().enumerate() {
            reporter.report(
                Level::Info,
                &format!("would attempt stage {}: {}", index + 1, s.name),
            );
        }
        PurgeOutcome::FullySucceeded
    }
}
