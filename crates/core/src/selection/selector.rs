//! The single ranking used by every caller that needs a "best" release.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filter::filter_releases;
use super::policy::{SelectionPolicy, TieBreak};
use crate::searcher::Release;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("No release satisfies the selection policy")]
    NoCandidates,
}

/// Filtered candidates in rank order; `best` is `ranked[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub best: Release,
    pub ranked: Vec<Release>,
}

/// Selection attached to a search outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Selection {
    Selected { best: Release, ranked: Vec<Release> },
    Empty,
}

impl Selection {
    pub fn best(&self) -> Option<&Release> {
        match self {
            Selection::Selected { best, .. } => Some(best),
            Selection::Empty => None,
        }
    }
}

impl From<Result<Ranked, SelectError>> for Selection {
    fn from(result: Result<Ranked, SelectError>) -> Self {
        match result {
            Ok(Ranked { best, ranked }) => Selection::Selected { best, ranked },
            Err(SelectError::NoCandidates) => Selection::Empty,
        }
    }
}

fn compare_key(a: &Release, b: &Release, key: TieBreak) -> Ordering {
    match key {
        TieBreak::Priority => a.indexer_priority.cmp(&b.indexer_priority),
        TieBreak::Seeders => b.seeders.unwrap_or(0).cmp(&a.seeders.unwrap_or(0)),
        TieBreak::Grabs => b.grabs.cmp(&a.grabs),
        TieBreak::Age => match (a.age_secs, b.age_secs) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Total order: the tie-break keys in order, then the identity key.
pub fn compare(a: &Release, b: &Release, tie_break: &[TieBreak]) -> Ordering {
    tie_break
        .iter()
        .fold(Ordering::Equal, |acc, key| acc.then_with(|| compare_key(a, b, *key)))
        .then_with(|| a.key.cmp(&b.key))
}

pub fn rank(releases: &mut [Release], tie_break: &[TieBreak]) {
    releases.sort_by(|a, b| compare(a, b, tie_break));
}

/// Rank already-filtered releases.
pub fn select(mut filtered: Vec<Release>, tie_break: &[TieBreak]) -> Result<Ranked, SelectError> {
    rank(&mut filtered, tie_break);
    let best = filtered.first().cloned().ok_or(SelectError::NoCandidates)?;
    Ok(Ranked {
        best,
        ranked: filtered,
    })
}

/// Filter by `policy`, then rank.
pub fn evaluate(releases: &[Release], policy: &SelectionPolicy) -> Result<Ranked, SelectError> {
    select(filter_releases(releases, policy), &policy.tie_break)
}

/// The best release under `policy`.
pub fn select_best(releases: &[Release], policy: &SelectionPolicy) -> Result<Release, SelectError> {
    evaluate(releases, policy).map(|r| r.best)
}
