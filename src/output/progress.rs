use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for the fetch, aggregate and render phases
pub struct PhaseProgress {
    pb: ProgressBar,
    visible: bool,
}

impl PhaseProgress {
    /// Starts the fetch phase. A hidden tracker draws nothing, for `--quiet`.
    pub fn start_phase_1(visible: bool) -> Self {
        if visible {
            eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        }
        let pb = create_spinner(bright_yellow("Phase 1/3: Fetching changes").to_string(), visible);
        Self { pb, visible }
    }

    pub fn finish_phase_1_start_phase_2(self, changes: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Fetched {changes} changes ✓")).to_string(),
        );
        let pb = create_spinner(
            bright_yellow("Phase 2/3: Aggregating statistics").to_string(),
            self.visible,
        );
        Self { pb, ..self }
    }

    pub fn finish_phase_2_start_phase_3(self) -> Self {
        self.pb
            .finish_with_message(bright_green("Phase 2/3: Statistics aggregated ✓").to_string());
        let pb = create_spinner(
            bright_yellow("Phase 3/3: Rendering reports").to_string(),
            self.visible,
        );
        Self { pb, ..self }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message(bright_green("Phase 3/3: Reports rendered ✓").to_string());
        if self.visible {
            eprintln!("\n");
        }
    }
}

fn create_spinner(message: String, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    });
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
