//! Terminal rendering for training progress and test examples.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use synapse_training::presentation::{
    accuracy_percentage, formatted_elapsed_time, image_source, is_correct_prediction, max_confidence_percentage,
};
use synapse_training::{NetworkExample, TrainingStatusView};

const BAR_TEMPLATE: &str = "{spinner:.green} [{wide_bar:.cyan/blue}] {pos:>3}% {msg}";

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().cyan());
    println!("{}", "─".repeat(60).dimmed());
}

/// Progress bar driven by `TrainingStatusView`s.
pub struct TrainingProgress {
    bar: ProgressBar,
}

impl Default for TrainingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message("waiting for server...");
        Self { bar }
    }

    pub fn update(&self, view: &TrainingStatusView) {
        self.bar.set_position(bar_position(view.progress));
        self.bar.set_message(status_line(view));
    }

    pub fn finish(&self, view: &TrainingStatusView) {
        self.update(view);
        self.bar.finish();
    }
}

/// Progress percentage clamped into the bar's range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bar_position(progress: f64) -> u64 {
    if progress.is_finite() { progress.clamp(0.0, 100.0).round() as u64 } else { 0 }
}

/// One-line summary: epoch, accuracy and elapsed time.
pub fn status_line(view: &TrainingStatusView) -> String {
    match view.current.as_ref() {
        Some(update) => format!(
            "epoch {}/{} | accuracy {:.2}% | {}s",
            update.epoch,
            update.total_epochs,
            accuracy_percentage(Some(update)),
            formatted_elapsed_time(Some(update)),
        ),
        None if view.training_loading => "starting...".to_string(),
        None => view.phase.to_string(),
    }
}

pub fn print_outcome(view: &TrainingStatusView) {
    if let Some(accuracy) = view.final_accuracy.filter(|_| view.training_complete) {
        println!("{} Final accuracy: {}", "✓".green(), format!("{:.2}%", accuracy * 100.0).bold());
    } else if let Some(error) = view.error.as_deref() {
        eprintln!("{} {}", "✗".red(), error.red());
    }
}

pub fn print_example(example: &NetworkExample) {
    let verdict = if is_correct_prediction(Some(example)) { "correct".green() } else { "wrong".red() };
    println!(
        "  actual {}  predicted {}  confidence {:.1}%  [{}]",
        example.actual_digit.to_string().bold(),
        example.predicted_digit.to_string().bold(),
        max_confidence_percentage(Some(&example.network_output)),
        verdict,
    );
    println!("  {}", output_bars(&example.network_output));
    println!("  {}", truncate(&image_source(&example.image_data), 72).dimmed());
}

/// Per-digit activations as a compact bar chart.
fn output_bars(output: &[f64]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    output
        .iter()
        .enumerate()
        .map(|(digit, value)| {
            let level = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let index = (level * 7.0).round() as usize;
            format!("{digit}{}", LEVELS[index])
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_training::{NetworkId, TrainingJobId, TrainingReducer, TrainingUpdate};

    #[test]
    fn test_bar_position_clamps() {
        assert_eq!(bar_position(-5.0), 0);
        assert_eq!(bar_position(66.7), 67);
        assert_eq!(bar_position(140.0), 100);
        assert_eq!(bar_position(f64::NAN), 0);
    }

    #[test]
    fn test_status_line_shows_epoch_and_accuracy() {
        let mut view = TrainingReducer::new().view();
        view.current = Some(TrainingUpdate {
            job_id: TrainingJobId::from("J1"),
            network_id: NetworkId::from("N1"),
            epoch: 2,
            total_epochs: 5,
            accuracy: Some(0.9123),
            elapsed_time: 5.567,
            progress: 40.0,
            correct: None,
            total: None,
        });
        assert_eq!(status_line(&view), "epoch 2/5 | accuracy 91.23% | 5.6s");
    }

    #[test]
    fn test_output_bars_has_one_entry_per_digit() {
        let bars = output_bars(&[0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, f64::NAN]);
        assert_eq!(bars.split(' ').count(), 10);
        assert!(bars.contains("7█"));
        assert!(bars.contains("9▁"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
