//! Command-line access to named semaphores shared between processes.

mod interrupt;
mod logger;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use semlock::{Kind, SemLock, SemLockError, SemLockIdentity, timeout_from_secs_f64};
use std::error::Error as _;
use std::process::ExitCode;

/// Exit status of a wait aborted by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "semctl", version, about = "Create, inspect and drive named semaphores")]
struct Cli {
    /// More output; repeat for debug and trace. Overrides SEMLOCK_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a named semaphore and leave its name published.
    ///
    /// Windows drops the object with its last handle, so there the
    /// semaphore disappears when this command exits.
    Create {
        name: String,
        #[arg(long, value_enum, default_value_t = KindArg::Semaphore)]
        kind: KindArg,
        /// Initial value.
        #[arg(long, default_value_t = 1)]
        value: u32,
        /// Highest value releases may reach.
        #[arg(long, default_value_t = 1)]
        max: u32,
    },
    /// Remove a name; processes holding it open keep working.
    Unlink { name: String },
    /// Print the current value of a named semaphore.
    Info { name: String },
    /// Take one unit, waiting if necessary. Ctrl-C aborts the wait.
    Acquire {
        name: String,
        /// Give up after this many seconds.
        #[arg(long, allow_negative_numbers = true, conflicts_with = "non_blocking")]
        timeout: Option<f64>,
        /// Try once and return immediately.
        #[arg(long)]
        non_blocking: bool,
    },
    /// Give one unit back.
    Release {
        name: String,
        /// Refuse to release past this value.
        #[arg(long, default_value_t = 1)]
        max: u32,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Mutex,
    Semaphore,
}

impl From<KindArg> for Kind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Mutex => Self::RecursiveMutex,
            KindArg::Semaphore => Self::Semaphore,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env = std::env::var(logger::LOG_ENV).ok();
    let level = logger::level_from(cli.verbose, env.as_deref());
    if let Err(err) = logger::StderrLogger::new(level).init() {
        eprintln!("semctl: cannot install logger: {err}");
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(SemLockError::Interrupted) => {
            log::info!("wait cancelled");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            eprintln!("semctl: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

/// Attaches to `name` as a plain semaphore. Ownership of a recursive mutex
/// never crosses processes, so the tool never opens one as such.
fn open(name: String, maxvalue: u32) -> semlock::Result<SemLock> {
    SemLock::open(&SemLockIdentity {
        handle: 0,
        kind: Kind::Semaphore,
        maxvalue,
        name: Some(name),
    })
}

fn run(command: Command) -> semlock::Result<ExitCode> {
    match command {
        Command::Create {
            name,
            kind,
            value,
            max,
        } => {
            let lock = SemLock::create(kind.into(), value, max, &name, false)?;
            println!("created {name} ({:?}, value {value}, max {max})", lock.kind());
        }
        Command::Unlink { name } => {
            semlock::unlink(&name)?;
            println!("unlinked {name}");
        }
        Command::Info { name } => {
            let lock = open(name, u32::MAX)?;
            let name = lock.name().unwrap_or_default();
            match lock.value() {
                Ok(value) => println!("{name}: value {value}"),
                Err(SemLockError::Unsupported(_)) => {
                    let state = if lock.is_zero()? { "zero" } else { "non-zero" };
                    println!("{name}: value {state}");
                }
                Err(err) => return Err(err),
            }
        }
        Command::Acquire {
            name,
            timeout,
            non_blocking,
        } => {
            let timeout = timeout.map(timeout_from_secs_f64).transpose()?;
            let lock = open(name, u32::MAX)?;
            if let Err(err) = interrupt::cancel_on_ctrl_c(lock.cancel_token()) {
                log::warn!("Ctrl-C will not cancel the wait: {err}");
            }

            if !lock.acquire(!non_blocking, timeout)? {
                println!("not acquired");
                return Ok(ExitCode::FAILURE);
            }
            println!("acquired");
        }
        Command::Release { name, max } => {
            let lock = open(name, max)?;
            lock.release()?;
            println!("released");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn acquire_accepts_negative_timeouts() {
        let cli = Cli::try_parse_from(["semctl", "acquire", "/x", "--timeout", "-1"]).unwrap();
        let Command::Acquire { timeout, .. } = cli.command else {
            panic!("expected acquire");
        };
        assert_eq!(timeout, Some(-1.0));
    }

    #[test]
    fn timeout_and_non_blocking_conflict() {
        assert!(
            Cli::try_parse_from(["semctl", "acquire", "/x", "--timeout", "1", "--non-blocking"])
                .is_err()
        );
    }

    #[test]
    fn verbosity_counts_after_the_subcommand() {
        let cli = Cli::try_parse_from(["semctl", "info", "/x", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn kind_names_map_to_lock_kinds() {
        assert_eq!(Kind::from(KindArg::Mutex), Kind::RecursiveMutex);
        assert_eq!(Kind::from(KindArg::Semaphore), Kind::Semaphore);
    }
}
