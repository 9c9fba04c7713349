use std::path::Path;

use crate::platform::Platform;
use crate::reporter::{Level, Reporter};

/// Takes ownership and opens up access rights over the target tree.
///
/// Advisory: every step may fail and is only logged. The deletion chain runs
/// regardless of what happened here.
pub fn normalize(target: &Path, platform: &dyn Platform, reporter: &dyn Reporter) {
    reporter.report(Level::Stage, "taking ownership and normalizing permissions");

    if let Err(e) = platform.take_ownership(target) {
        reporter.report(Level::Warn, &format!("take ownership: {e}"));
    }
    if let Err(e) = platform.grant_full_access(target) {
        reporter.report(Level::Warn, &format!("grant full access: {e}"));
    }
    if let Err(e) = platform.clear_attributes(target) {
        reporter.report(Level::Warn, &format!("clear attributes: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, RecordingReporter};
    use std::path::PathBuf;

    #[test]
    fn all_three_operations_run_even_when_each_fails() {
        let target = PathBuf::from(r"C:\locked");
        let mut fake = FakePlatform::with_target(&target);
        fake.fail_acl = true;
        let reporter = RecordingReporter::default();

        normalize(&target, &fake, &reporter);

        let calls = fake.calls.lock().unwrap().clone();
        assert!(calls.iter().any(|c| c.starts_with("take_ownership")));
        assert!(calls.iter().any(|c| c.starts_with("grant_full_access")));
        assert!(calls.iter().any(|c| c.starts_with("clear_attributes")));
        assert!(reporter.contains("take ownership"));
    }
}
