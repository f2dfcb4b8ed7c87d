use serde::{Deserialize, Serialize};

use super::quality::QualityProfile;
use crate::indexer::CategoryId;

/// Ranking key applied before the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lower indexer priority number first.
    Priority,
    /// More seeders first; unknown counts as 0.
    Seeders,
    /// More grabs first.
    Grabs,
    /// Newer first; unknown age last.
    Age,
}

/// Caller preferences for filtering and ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    #[serde(default)]
    pub quality: QualityProfile,
    /// Canonical categories a release must belong to; empty means any.
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default = "default_tie_break")]
    pub tie_break: Vec<TieBreak>,
}

pub fn default_tie_break() -> Vec<TieBreak> {
    vec![TieBreak::Priority, TieBreak::Seeders, TieBreak::Grabs]
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            quality: QualityProfile::Any,
            categories: Vec::new(),
            tie_break: default_tie_break(),
        }
    }
}

impl SelectionPolicy {
    pub fn with_quality(quality: QualityProfile) -> Self {
        Self {
            quality,
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = CategoryId>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }
}
