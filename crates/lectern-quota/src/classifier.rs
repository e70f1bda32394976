// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic message weighting.
//!
//! A message is scored against two vocabularies: catalog browsing and
//! open-ended composition. The winning side and the message length decide
//! how many units of the daily message budget it costs. Pure string work,
//! no model call.

use serde::Serialize;
use strum::Display;

/// Messages longer than this many characters are charged extra when no
/// vocabulary dominates.
pub const LONG_QUERY_CHARS: usize = 500;

const COMPLEX_BASE: f64 = 1.5;
const COMPLEX_STEP: f64 = 0.3;
const MAX_WEIGHT: f64 = 3.0;

/// Word stems for catalog browsing. A word matches when it starts with a stem.
const CATALOG_STEMS: &[&str] = &[
    "find", "search", "book", "show", "list", "author", "title", "catalog", "item", "entr",
    "browse", "recommend", "available", "borrow", "novel", "genre", "shelf",
];

/// Word stems for composition and analysis work.
const COMPLEX_STEMS: &[&str] = &[
    "compar", "analy", "compos", "writ", "essay", "summar", "explain", "translat", "draft",
    "research", "critiqu", "evaluat", "plan", "argu", "contrast", "interpret",
];

/// Why a message got its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WeightCategory {
    /// Catalog vocabulary dominated.
    Catalog,
    /// Composition vocabulary dominated.
    Complex,
    /// Neither dominated, but the message is long.
    Long,
    Standard,
}

/// Result of weighting one message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryWeight {
    pub weight: f64,
    pub category: WeightCategory,
    pub catalog_hits: usize,
    pub complex_hits: usize,
}

impl QueryWeight {
    /// Units charged against the daily message budget.
    pub fn message_cost(&self) -> i64 {
        self.weight.ceil() as i64
    }
}

/// Keyword-based message weigher.
#[derive(Debug, Clone, Default)]
pub struct WeightClassifier;

impl WeightClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> QueryWeight {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let catalog_hits = count_hits(&words, CATALOG_STEMS);
        let complex_hits = count_hits(&words, COMPLEX_STEMS);

        let (weight, category) = if catalog_hits > complex_hits {
            (1.0, WeightCategory::Catalog)
        } else if complex_hits > catalog_hits {
            let weight = (COMPLEX_BASE + COMPLEX_STEP * complex_hits as f64).min(MAX_WEIGHT);
            (weight, WeightCategory::Complex)
        } else if text.chars().count() > LONG_QUERY_CHARS {
            (1.5, WeightCategory::Long)
        } else {
            (1.0, WeightCategory::Standard)
        };

        QueryWeight {
            weight,
            category,
            catalog_hits,
            complex_hits,
        }
    }
}

fn count_hits(words: &[&str], stems: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| stems.iter().any(|s| w.starts_with(s)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classify(text: &str) -> QueryWeight {
        WeightClassifier::new().classify(text)
    }

    #[test]
    fn catalog_browsing_costs_one() {
        let w = classify("find me books about AI");
        assert_eq!(w.category, WeightCategory::Catalog);
        assert_eq!(w.weight, 1.0);
        assert_eq!(w.message_cost(), 1);
    }

    #[test]
    fn composition_is_complex() {
        let w = classify("write and compose an essay comparing two authors");
        assert_eq!(w.category, WeightCategory::Complex);
        assert!(w.weight >= 1.5);
        assert_eq!(w.complex_hits, 4);
        assert_eq!(w.catalog_hits, 1);
        assert_eq!(w.message_cost(), 3);
    }

    #[test]
    fn complex_weight_caps_at_three() {
        let w = classify("analyze compare contrast evaluate critique summarize explain draft");
        assert_eq!(w.weight, 3.0);
    }

    #[test]
    fn single_complex_word_rounds_up_to_two() {
        let w = classify("explain this");
        assert!((w.weight - 1.8).abs() < 1e-9);
        assert_eq!(w.message_cost(), 2);
    }

    #[test]
    fn tie_falls_through_to_length() {
        let short = classify("search and summarize");
        assert_eq!(short.category, WeightCategory::Standard);
        assert_eq!(short.weight, 1.0);

        let long = format!("search and summarize {}", "x".repeat(LONG_QUERY_CHARS));
        let long = classify(&long);
        assert_eq!(long.category, WeightCategory::Long);
        assert_eq!(long.message_cost(), 2);
    }

    #[test]
    fn plain_chat_is_standard() {
        assert_eq!(classify("hello there").category, WeightCategory::Standard);
        assert_eq!(classify("").weight, 1.0);
    }

    proptest! {
        #[test]
        fn weight_stays_in_range(text in ".{0,800}") {
            let w = classify(&text);
            prop_assert!((1.0..=3.0).contains(&w.weight));
            prop_assert!((1..=3).contains(&w.message_cost()));
        }
    }
}
