//! Logging setup on the `log` facade with an `env_logger` backend.
//!
//! Level selection, highest priority first:
//!
//! 1. `RUST_LOG`, when set
//! 2. `--quiet` (errors only)
//! 3. `-v` (debug) or `-vv` (trace)
//! 4. info
//!
//! Debug builds prefix each line with a timestamp, and with the module path
//! once `-v` is given. Release builds print level and message only.

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize logging from CLI verbosity flags.
///
/// Safe to call more than once; later calls leave the first logger in place.
///
/// ```rust,no_run
/// photodedup::logging::init_logging(1, false);
/// log::debug!("visible with -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").is_ok();
    let level = determine_level(verbose, quiet);

    let mut builder = Builder::new();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level);
    }
    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        log::debug!("Logging initialized from RUST_LOG");
    } else {
        log::debug!("Logging initialized at level: {:?}", level);
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        let timestamp = buf.timestamp_seconds();
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{} {style}{:<5}{style:#} {}", timestamp, level, record.args())
        }
    });

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}
