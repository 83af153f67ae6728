use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

/// Crates whose request-level chatter stays out of the report logs.
const NOISY_MODULES: [&str; 3] = ["reqwest", "hyper", "hyper_util"];

pub fn console_level(verbose: bool, quiet: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    }
}

pub fn file_level(trace: bool) -> LevelFilter {
    if trace {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(level);
    for module in NOISY_MODULES {
        builder.filter_module(module, LevelFilter::Warn);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder
}

/// Sends every record to the console logger and, when configured, to the
/// logfile logger. Each side applies its own level.
struct Tee {
    console: Logger,
    file: Option<Logger>,
}

impl Log for Tee {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || self.file.as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record<'_>) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if let Some(file) = self.file.as_ref().filter(|f| f.matches(record)) {
            file.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// Installs the global logger: console on stderr, plus an append-only
/// logfile when `logfile` is given.
pub fn init(verbose: bool, quiet: bool, logfile: Option<&Path>, trace: bool) -> Result<()> {
    let console = builder(console_level(verbose, quiet)).build();

    let file = match logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            let mut file_builder = builder(file_level(trace));
            file_builder
                .target(Target::Pipe(Box::new(file)))
                .write_style(WriteStyle::Never)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "{} {:<5} {}: {}",
                        buf.timestamp_millis(),
                        record.level(),
                        record.target(),
                        record.args()
                    )
                });
            Some(file_builder.build())
        }
        None => None,
    };

    let max_level = file
        .as_ref()
        .map_or(console.filter(), |f| f.filter().max(console.filter()));

    log::set_boxed_logger(Box::new(Tee { console, file })).context("Logger already installed")?;
    log::set_max_level(max_level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(false, false), LevelFilter::Info);
        assert_eq!(console_level(false, true), LevelFilter::Error);
        assert_eq!(console_level(true, false), LevelFilter::Debug);
        assert_eq!(console_level(true, true), LevelFilter::Debug);
    }

    #[test]
    fn test_file_level() {
        assert_eq!(file_level(false), LevelFilter::Info);
        assert_eq!(file_level(true), LevelFilter::Debug);
    }

    #[test]
    fn test_tee_filters_per_target() {
        let console = Builder::new().filter_level(LevelFilter::Error).build();
        let file = Builder::new()
            .filter_level(LevelFilter::Debug)
            .target(Target::Pipe(Box::new(std::io::sink())))
            .build();
        let tee = Tee {
            console,
            file: Some(file),
        };

        let debug = Metadata::builder().level(log::Level::Debug).target("zing_stats").build();
        assert!(tee.enabled(&debug));

        let without_file = Tee {
            console: Builder::new().filter_level(LevelFilter::Error).build(),
            file: None,
        };
        assert!(!without_file.enabled(&debug));
    }
}
