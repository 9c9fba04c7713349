use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

mod acl;
mod engine;
mod locks;
mod platform;
mod reporter;
mod strategy;
#[cfg(test)]
mod testing;
#[cfg(windows)]
mod win;

use engine::{Engine, PurgeOutcome};
use platform::Platform;
use reporter::{ConsoleReporter, FileReporter, Level, MultiReporter, Reporter};

/// Forcibly deletes a directory, escalating through shell deletion, rename
/// tricks, an elevated cleanup script, and finally reboot-time removal.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Absolute path of the directory to purge
    path: PathBuf,

    /// Report what would be done without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Append all progress lines to this file as well
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();

    // Stages 4 and 5 need administrator rights; relaunch through the consent
    // prompt up front rather than half-succeeding later.
    #[cfg(windows)]
    if !args.dry_run && !win::is_elevated() {
        println!("[*] elevating privileges...");
        win::relaunch_elevated();
    }

    let mut sinks: Vec<Box<dyn Reporter>> = vec![Box::new(ConsoleReporter)];
    if let Some(log_path) = &args.log_file {
        sinks.push(Box::new(FileReporter::open(log_path)?));
    }
    let reporter = MultiReporter::new(sinks);

    let platform = native_platform()?;

    if !args.dry_run {
        println!(
            "WARNING: this will destroy the directory:\n  {}\n",
            args.path.display()
        );
        if !confirm(&mut std::io::stdin().lock(), &mut std::io::stdout())? {
            println!("Operation cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
        countdown(&reporter);
    }

    let outcome = Engine::run(&args.path, platform.as_ref(), &reporter, args.dry_run);
    Ok(match outcome {
        PurgeOutcome::FullySucceeded => ExitCode::SUCCESS,
        PurgeOutcome::ScheduledForReboot | PurgeOutcome::Failed => ExitCode::from(1),
    })
}

#[cfg(windows)]
fn native_platform() -> Result<Box<dyn Platform>> {
    Ok(Box::new(win::WinPlatform::new()))
}

#[cfg(not(windows))]
fn native_platform() -> Result<Box<dyn Platform>> {
    anyhow::bail!("this tool only supports Windows")
}

/// Gate before anything destructive. Only an explicit `y` proceeds.
fn confirm(input: &mut impl BufRead, output: &mut impl Write) -> std::io::Result<bool> {
    write!(output, "Continue? (y/N): ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

/// Last-chance window before the chain starts.
fn countdown(reporter: &dyn Reporter) {
    reporter.report(Level::Warn, "proceeding in 3 seconds, Ctrl+C to abort");
    std::thread::sleep(Duration::from_secs(3));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> bool {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        confirm(&mut input, &mut output).unwrap()
    }

    #[test]
    fn only_an_explicit_y_proceeds() {
        assert!(answer("y\n"));
        assert!(answer("Y\n"));
        assert!(answer("  y  \n"));
    }

    #[test]
    fn everything_else_cancels() {
        assert!(!answer("n\n"));
        assert!(!answer("\n"));
        assert!(!answer(""));
        assert!(!answer("yes\n"));
        assert!(!answer("q\n"));
    }

    #[test]
    fn prompt_is_written_before_reading() {
        let mut input = Cursor::new(b"y\n".to_vec());
        let mut output = Vec::new();
        confirm(&mut input, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Continue? (y/N): ");
    }
}
