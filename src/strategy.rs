use std::path::Path;

use rand::Rng;

use crate::platform::Platform;
use crate::reporter::{Level, Reporter};

/// Result of one deletion strategy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Post-check confirmed the target is gone.
    Removed,
    /// The OS accepted a reboot-time deletion; the target is still present.
    Scheduled,
    /// The attempt did not remove the target.
    Failed,
}

pub struct Strategy {
    pub name: &'static str,
    run: fn(&Path, &dyn Platform, &dyn Reporter) -> StrategyOutcome,
}

impl Strategy {
    fn attempt(
        &self,
        target: &Path,
        platform: &dyn Platform,
        reporter: &dyn Reporter,
    ) -> StrategyOutcome {
        (self.run)(target, platform, reporter)
    }
}

/// The fallback chain, most polite technique first. Order is the contract:
/// a later stage runs only after the one before it verifiably failed.
pub static CHAIN: [Strategy; 5] = [
    Strategy {
        name: "direct recursive delete",
        run: direct_delete,
    },
    Strategy {
        name: "shell forced delete",
        run: shell_delete,
    },
    Strategy {
        name: "rename then delete",
        run: rename_then_delete,
    },
    Strategy {
        name: "elevated cleanup script",
        run: nuclear_batch,
    },
    Strategy {
        name: "reboot-time deletion",
        run: reboot_schedule,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainResult {
    Removed,
    Scheduled,
    Exhausted,
}

/// Walks the chain in order, stopping at the first stage whose post-check
/// shows the target gone, or that registered it for reboot-time removal.
pub fn run_chain(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) -> ChainResult {
    for (index, strategy) in CHAIN.iter().enumerate() {
        reporter.report(
            Level::Stage,
            &format!("stage {}: {}", index + 1, strategy.name),
        );
        match strategy.attempt(target, platform, reporter) {
            StrategyOutcome::Removed => {
                reporter.report(Level::Success, &format!("{} succeeded", strategy.name));
                return ChainResult::Removed;
            }
            StrategyOutcome::Scheduled => return ChainResult::Scheduled,
            StrategyOutcome::Failed => {
                reporter.report(
                    Level::Warn,
                    &format!("{} did not remove the target", strategy.name),
                );
            }
        }
    }
    ChainResult::Exhausted
}

fn direct_delete(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) -> StrategyOutcome {
    if let Err(e) = platform.remove_tree(target) {
        reporter.report(Level::Warn, &format!("recursive remove: {e}"));
    }
    verify(target, platform)
}

fn shell_delete(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) -> StrategyOutcome {
    if let Err(e) = platform.shell_remove_tree(target) {
        reporter.report(Level::Warn, &format!("shell remove: {e}"));
    }
    verify(target, platform)
}

/// Renaming first breaks lingering handle-to-path associations on NTFS, so
/// a delete that keeps failing by name can succeed under a fresh one.
fn rename_then_delete(
    target: &Path,
    platform: &dyn Platform,
    reporter: &dyn Reporter,
) -> StrategyOutcome {
    let Some(parent) = target.parent() else {
        return StrategyOutcome::Failed;
    };
    let renamed = parent.join(format!("del_{}", random_suffix()));

    if let Err(e) = platform.rename(target, &renamed) {
        reporter.report(Level::Warn, &format!("rename: {e}"));
        return StrategyOutcome::Failed;
    }
    reporter.report(Level::Info, &format!("renamed to {}", renamed.display()));

    if let Err(e) = platform.remove_tree(&renamed) {
        reporter.report(Level::Warn, &format!("remove renamed: {e}"));
    }
    if !platform.exists(target) && !platform.exists(&renamed) {
        return StrategyOutcome::Removed;
    }

    // Keep later stages pointed at the original path.
    if platform.exists(&renamed) && platform.rename(&renamed, target).is_err() {
        reporter.report(
            Level::Error,
            &format!("leftover copy remains at {}", renamed.display()),
        );
    }
    StrategyOutcome::Failed
}

/// Process images commonly pinning handles open. The desktop shell is killed
/// up front and restarted at the end of the script.
const LOCK_HOLDER_IMAGES: &[&str] = &["explorer.exe"];

/// Builds the batch script for the combined elevated attempt: kill known
/// lock holders, re-take ownership, open up ACLs, strip attributes, force
/// delete, then bring the shell back.
pub fn build_nuclear_script(target: &Path) -> String {
    let path = target.display();
    let mut script = String::from("@echo off\r\n");
    for image in LOCK_HOLDER_IMAGES {
        script.push_str(&format!("taskkill /F /IM {image} /T\r\n"));
    }
    script.push_str(&format!("takeown /F \"{path}\" /R /D Y\r\n"));
    script.push_str(&format!("icacls \"{path}\" /grant administrators:F /T /C /Q\r\n"));
    script.push_str(&format!("attrib -r -s -h \"{path}\\*.*\" /S /D\r\n"));
    script.push_str(&format!("rd /S /Q \"{path}\"\r\n"));
    script.push_str("start explorer.exe\r\n");
    script.push_str("exit\r\n");
    script
}

fn nuclear_batch(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) -> StrategyOutcome {
    let script = build_nuclear_script(target);
    if let Err(e) = platform.run_script_elevated(&script) {
        reporter.report(Level::Warn, &format!("elevated script: {e}"));
    }
    verify(target, platform)
}

fn reboot_schedule(
    target: &Path,
    platform: &dyn Platform,
    reporter: &dyn Reporter,
) -> StrategyOutcome {
    match platform.schedule_delete_on_reboot(target) {
        Ok(()) => {
            if !platform.exists(target) {
                StrategyOutcome::Removed
            } else {
                reporter.report(
                    Level::Info,
                    "target registered for deletion during the next boot",
                );
                StrategyOutcome::Scheduled
            }
        }
        Err(e) => {
            reporter.report(Level::Error, &format!("reboot scheduling: {e}"));
            StrategyOutcome::Failed
        }
    }
}

fn verify(target: &Path, platform: &dyn Platform) -> StrategyOutcome {
    if platform.exists(target) {
        StrategyOutcome::Failed
    } else {
        StrategyOutcome::Removed
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}
