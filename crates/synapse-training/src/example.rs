//! Classified test examples returned by a trained network.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Image shown when an example had to be synthesized locally.
pub const FALLBACK_IMAGE: &str = "assets/fallback-digit.png";

/// Maximum examples kept per kind for gallery display.
pub const GALLERY_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkExample {
    pub image_data: String,
    pub actual_digit: u8,
    pub predicted_digit: u8,
    #[serde(default)]
    pub correct: bool,
    #[serde(default)]
    pub network_output: Vec<f64>,
}

/// Example endpoints answer with one object or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExamplePayload {
    Many(Vec<NetworkExample>),
    One(NetworkExample),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleKind {
    Successful,
    Unsuccessful,
}

impl ExampleKind {
    /// Either kind with equal probability.
    #[must_use]
    pub fn random() -> Self {
        if rand::thread_rng().gen_bool(0.5) { Self::Successful } else { Self::Unsuccessful }
    }

    #[must_use]
    pub fn is_successful(self) -> bool {
        self == Self::Successful
    }

    /// Path segment under `/networks/{id}/`.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Successful => "successful_example",
            Self::Unsuccessful => "unsuccessful_example",
        }
    }
}

impl ExamplePayload {
    /// Flatten into at most `limit` examples, marking each with the requested kind.
    #[must_use]
    pub fn into_examples(self, kind: ExampleKind, limit: usize) -> Vec<NetworkExample> {
        let examples = match self {
            Self::One(example) => vec![example],
            Self::Many(examples) => examples,
        };
        examples
            .into_iter()
            .take(limit)
            .map(|example| NetworkExample { correct: kind.is_successful(), ..example })
            .collect()
    }
}

fn synthetic_output(predicted: u8, peak: f64) -> Vec<f64> {
    (0..10u8).map(|digit| if digit == predicted { peak } else { 0.05 }).collect()
}

/// Locally synthesized stand-in for a failed single-example fetch.
#[must_use]
pub fn fallback_example(kind: ExampleKind) -> NetworkExample {
    let (actual, predicted) = match kind {
        ExampleKind::Successful => (7, 7),
        ExampleKind::Unsuccessful => (9, 4),
    };
    NetworkExample {
        image_data: FALLBACK_IMAGE.to_string(),
        actual_digit: actual,
        predicted_digit: predicted,
        correct: kind.is_successful(),
        network_output: synthetic_output(predicted, 0.8),
    }
}

/// Locally synthesized stand-ins for a failed gallery fetch.
#[must_use]
pub fn fallback_examples(kind: ExampleKind, count: usize) -> Vec<NetworkExample> {
    (0..count)
        .map(|i| {
            let offset = (i % 10) as u8;
            let actual = match kind {
                ExampleKind::Successful => (offset + 1) % 10,
                ExampleKind::Unsuccessful => (offset + 6) % 10,
            };
            let predicted = if kind.is_successful() { actual } else { (actual + 2) % 10 };
            NetworkExample {
                image_data: FALLBACK_IMAGE.to_string(),
                actual_digit: actual,
                predicted_digit: predicted,
                correct: kind.is_successful(),
                network_output: synthetic_output(predicted, 0.1f64.mul_add(i as f64, 0.7)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accepts_single_object() {
        let payload: ExamplePayload = serde_json::from_str(
            r#"{"image_data":"abc","actual_digit":3,"predicted_digit":3,"correct":false,"network_output":[0.1]}"#,
        )
        .unwrap();
        let examples = payload.into_examples(ExampleKind::Successful, GALLERY_SIZE);
        assert_eq!(examples.len(), 1);
        assert!(examples[0].correct);
    }

    #[test]
    fn test_payload_array_is_capped_and_marked() {
        let one = r#"{"image_data":"x","actual_digit":1,"predicted_digit":2,"correct":true,"network_output":[]}"#;
        let json = format!("[{one},{one},{one},{one},{one}]");
        let payload: ExamplePayload = serde_json::from_str(&json).unwrap();
        let examples = payload.into_examples(ExampleKind::Unsuccessful, GALLERY_SIZE);
        assert_eq!(examples.len(), 3);
        assert!(examples.iter().all(|e| !e.correct));
    }

    #[test]
    fn test_fallback_examples_match_kind() {
        let ok = fallback_example(ExampleKind::Successful);
        assert_eq!((ok.actual_digit, ok.predicted_digit), (7, 7));
        assert!((ok.network_output[7] - 0.8).abs() < 1e-9);

        let bad = fallback_example(ExampleKind::Unsuccessful);
        assert_eq!((bad.actual_digit, bad.predicted_digit), (9, 4));
        assert!(!bad.correct);
    }

    #[test]
    fn test_fallback_gallery_layout() {
        let failures = fallback_examples(ExampleKind::Unsuccessful, 3);
        let digits: Vec<(u8, u8)> = failures.iter().map(|e| (e.actual_digit, e.predicted_digit)).collect();
        assert_eq!(digits, vec![(6, 8), (7, 9), (8, 0)]);
        assert!((failures[2].network_output[0] - 0.9).abs() < 1e-9);

        let successes = fallback_examples(ExampleKind::Successful, 3);
        assert!(successes.iter().all(|e| e.actual_digit == e.predicted_digit));
    }
}
