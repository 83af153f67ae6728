mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use styling::{blue_bold, dim};
pub use summary::{print_summary, RunSummary};

/// Prints the zing-stats banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        blue_bold("📈 zing-stats"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Code review and CI statistics")
    );
}
