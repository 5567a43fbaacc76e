//! Display formatting for training progress and test examples.

use crate::events::TrainingUpdate;
use crate::example::NetworkExample;

/// Accuracy of the latest update as a percentage; unmeasured accuracy counts as 0.
#[must_use]
pub fn accuracy_percentage(update: Option<&TrainingUpdate>) -> f64 {
    update.map_or(0.0, |u| u.accuracy.unwrap_or(0.0) * 100.0)
}

/// Elapsed seconds with one fractional digit, rounding halves away from zero.
/// Negative readings show as `"0.0"`.
#[must_use]
pub fn formatted_elapsed_time(update: Option<&TrainingUpdate>) -> String {
    update.map_or_else(|| "0.0".to_string(), |u| format!("{:.1}", round_to_tenths(u.elapsed_time)))
}

fn round_to_tenths(value: f64) -> f64 {
    // `+ 0.0` turns a rounded -0.0 into 0.0.
    (value.max(0.0) * 10.0).round() / 10.0 + 0.0
}

/// Highest output activation as a percentage; 0 when there is nothing usable.
#[must_use]
pub fn max_confidence_percentage(output: Option<&[f64]>) -> f64 {
    let Some(output) = output else {
        return 0.0;
    };
    output
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::max)
        .map_or(0.0, |max| max * 100.0)
}

/// True iff the network predicted the actual digit.
#[must_use]
pub fn is_correct_prediction(example: Option<&NetworkExample>) -> bool {
    example.is_some_and(|e| e.predicted_digit == e.actual_digit)
}

/// Image reference usable by a renderer: data URIs, URLs and bundled assets
/// pass through, anything else is treated as raw base64 PNG.
#[must_use]
pub fn image_source(image_data: &str) -> String {
    if image_data.is_empty()
        || image_data.starts_with("data:image/")
        || image_data.starts_with("http")
        || image_data.starts_with("assets/")
    {
        return image_data.to_string();
    }
    format!("data:image/png;base64,{image_data}")
}
