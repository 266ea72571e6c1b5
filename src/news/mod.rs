//! News aggregation
//!
//! Merges the per-feed results into one bundle ordered by `published_at` descending.
//! A failing feed contributes nothing; its id is recorded in `failed_sources` and the
//! merge carries on with the rest.

use crate::error::{AppError, Result};
use crate::sources::types::{NewsCategory, NewsItem};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Outcome of one news feed
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source_id: String,
    pub role: NewsCategory,
    pub outcome: Result<Vec<NewsItem>>,
}

impl SourceResult {
    pub fn new(source_id: impl Into<String>, role: NewsCategory, outcome: Result<Vec<NewsItem>>) -> Self {
        Self {
            source_id: source_id.into(),
            role,
            outcome,
        }
    }
}

/// A news item tagged with the role of the feed it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedItem {
    pub category: NewsCategory,
    pub source_id: String,
    #[serde(flatten)]
    pub item: NewsItem,
}

/// Merged view over every configured feed
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewsBundle {
    items: Vec<CategorizedItem>,
    failed_sources: BTreeSet<String>,
    succeeded_sources: usize,
    /// Indices into `items` per category, each in chronological order
    #[serde(skip)]
    by_category: BTreeMap<NewsCategory, Vec<usize>>,
}

impl NewsBundle {
    /// Every item, newest first
    pub fn items(&self) -> &[CategorizedItem] {
        &self.items
    }

    pub fn failed_sources(&self) -> &BTreeSet<String> {
        &self.failed_sources
    }

    pub fn succeeded_sources(&self) -> usize {
        self.succeeded_sources
    }

    /// Items of one category, newest first
    pub fn category(&self, category: NewsCategory) -> impl Iterator<Item = &CategorizedItem> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .map(|&index| &self.items[index])
    }

    /// Categories that have at least one item, in declaration order
    pub fn categories(&self) -> impl Iterator<Item = NewsCategory> + '_ {
        self.by_category.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when no feed succeeded; an empty but successful feed still counts
    pub fn is_unavailable(&self) -> bool {
        self.succeeded_sources == 0
    }

    /// Gate for downstream stages: the bundle, or a dependency failure naming the feeds
    pub fn require_available(&self) -> Result<&Self> {
        if self.is_unavailable() {
            return Err(AppError::DependencyFailed {
                group: "news".to_string(),
                reason: if self.failed_sources.is_empty() {
                    "no news feeds configured".to_string()
                } else {
                    format!(
                        "all news feeds failed: {}",
                        self.failed_sources.iter().cloned().collect::<Vec<_>>().join(", ")
                    )
                },
            });
        }
        Ok(self)
    }
}

pub struct NewsAggregator;

impl NewsAggregator {
    /// Merge per-feed results into one bundle.
    ///
    /// Never fails. Items with equal timestamps keep their input order
    /// (feed order, then position within the feed).
    pub fn merge(results: Vec<SourceResult>) -> NewsBundle {
        let mut items = Vec::new();
        let mut failed_sources = BTreeSet::new();
        let mut succeeded_sources = 0;

        for result in results {
            match result.outcome {
                Ok(feed_items) => {
                    succeeded_sources += 1;
                    debug!("News feed {} returned {} item(s)", result.source_id, feed_items.len());
                    items.extend(feed_items.into_iter().map(|item| CategorizedItem {
                        category: result.role,
                        source_id: result.source_id.clone(),
                        item,
                    }));
                }
                Err(e) => {
                    warn!("News feed {} failed: {}", result.source_id, e);
                    failed_sources.insert(result.source_id);
                }
            }
        }

        // Vec::sort_by is stable
        items.sort_by(|a, b| b.item.published_at.cmp(&a.item.published_at));

        let mut by_category: BTreeMap<NewsCategory, Vec<usize>> = BTreeMap::new();
        for (index, item) in items.iter().enumerate() {
            by_category.entry(item.category).or_default().push(index);
        }

        NewsBundle {
            items,
            failed_sources,
            succeeded_sources,
            by_category,
        }
    }
}
