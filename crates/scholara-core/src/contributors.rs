//! Contributor directory filtering and ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Contributor, CoreError};

/// Ordering applied to the contributor directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOption {
    #[default]
    ContributionsDesc,
    ContributionsAsc,
    NameAsc,
    NameDesc,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::ContributionsDesc => "contributions-desc",
            SortOption::ContributionsAsc => "contributions-asc",
            SortOption::NameAsc => "name-asc",
            SortOption::NameDesc => "name-desc",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOption {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "contributions-desc" => Ok(SortOption::ContributionsDesc),
            "contributions-asc" => Ok(SortOption::ContributionsAsc),
            "name-asc" => Ok(SortOption::NameAsc),
            "name-desc" => Ok(SortOption::NameDesc),
            other => Err(CoreError::UnknownSortOption(other.to_string())),
        }
    }
}

/// Keep contributors whose name or e-mail contains `search` (case-insensitive).
/// A blank search keeps everyone.
pub fn filter_contributors(contributors: Vec<Contributor>, search: &str) -> Vec<Contributor> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return contributors;
    }
    contributors
        .into_iter()
        .filter(|c| {
            [c.name.as_deref(), c.email.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Sort in place. Ties are broken by user id so the order is deterministic.
pub fn sort_contributors(contributors: &mut [Contributor], sort: SortOption) {
    contributors.sort_by(|a, b| {
        let primary = match sort {
            SortOption::ContributionsDesc => b.contribution_count.cmp(&a.contribution_count),
            SortOption::ContributionsAsc => a.contribution_count.cmp(&b.contribution_count),
            SortOption::NameAsc => display_key(a).cmp(&display_key(b)),
            SortOption::NameDesc => display_key(b).cmp(&display_key(a)),
        };
        match primary {
            Ordering::Equal => a.user_id.cmp(&b.user_id),
            other => other,
        }
    });
}

/// Filter then sort, as the directory view does.
pub fn rank_contributors(
    contributors: Vec<Contributor>,
    search: Option<&str>,
    sort: SortOption,
) -> Vec<Contributor> {
    let mut ranked = filter_contributors(contributors, search.unwrap_or(""));
    sort_contributors(&mut ranked, sort);
    ranked
}

fn display_key(c: &Contributor) -> String {
    c.name
        .as_deref()
        .or(c.email.as_deref())
        .unwrap_or("")
        .to_lowercase()
}
