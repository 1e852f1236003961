//! Categorical encoders
//!
//! Each encoder records the vocabulary it saw during fitting. Categories that
//! only show up at prediction time resolve to a fixed fallback instead of failing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Type of encoder chosen for a categorical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderType {
    OneHot,
    Ordinal,
}

/// One output per training category; unseen categories encode as all zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn output_names(&self, column: &str) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{column}_{c}"))
            .collect()
    }

    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let hit = self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok();
        out.extend((0..self.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
    }
}

/// Single output holding the category index; unseen categories map to the
/// "unknown" bucket, whose index equals the vocabulary size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    pub categories: Vec<String>,
}

impl OrdinalEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn unknown_index(&self) -> usize {
        self.categories.len()
    }

    pub fn encode(&self, value: &str) -> f64 {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .unwrap_or(self.unknown_index()) as f64
    }
}

/// Stable mapping between class labels and indices, sorted at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit from labels already in their canonical order
    pub fn from_sorted(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_unseen_is_zeros() {
        let encoder = OneHotEncoder::fit(["red", "blue", "red"]);
        assert_eq!(encoder.categories, vec!["blue", "red"]);
        assert_eq!(encoder.output_names("color"), vec!["color_blue", "color_red"]);

        let mut out = Vec::new();
        encoder.encode_into("red", &mut out);
        encoder.encode_into("green", &mut out);
        assert_eq!(out, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_ordinal_unknown_bucket() {
        let encoder = OrdinalEncoder::fit(["c", "a", "b"]);
        assert_eq!(encoder.encode("a"), 0.0);
        assert_eq!(encoder.encode("c"), 2.0);
        assert_eq!(encoder.encode("zzz"), 3.0);
    }

    #[test]
    fn test_label_encoder() {
        let encoder = LabelEncoder::from_sorted(vec!["no".to_string(), "yes".to_string()]);
        assert_eq!(encoder.encode("yes"), Some(1));
        assert_eq!(encoder.decode(0), Some("no"));
        assert_eq!(encoder.encode("maybe"), None);
    }
}
