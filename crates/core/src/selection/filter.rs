use super::policy::SelectionPolicy;
use crate::indexer::categories_match;
use crate::searcher::Release;

/// Whether one release passes the category and quality constraints.
pub fn accepts(policy: &SelectionPolicy, release: &Release) -> bool {
    categories_match(&release.categories, &policy.categories) && policy.quality.matches(&release.title)
}

/// Releases passing `policy`, in input order.
pub fn filter_releases(releases: &[Release], policy: &SelectionPolicy) -> Vec<Release> {
    releases
        .iter()
        .filter(|r| accepts(policy, r))
        .cloned()
        .collect()
}
