//! Fetch task identity

use serde::Serialize;
use std::fmt;

/// Upstream capability a fetch task draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Quote,
    PriceHistory,
    Indicator,
    News,
    Analysis,
}

impl SourceKind {
    /// Symbol-scoped tasks are abandoned when the selected symbol changes
    pub fn is_symbol_scoped(&self) -> bool {
        matches!(
            self,
            SourceKind::Quote | SourceKind::PriceHistory | SourceKind::Indicator
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Quote => "quote",
            SourceKind::PriceHistory => "price_history",
            SourceKind::Indicator => "indicator",
            SourceKind::News => "news",
            SourceKind::Analysis => "analysis",
        }
    }
}

/// Unique key of a fetch task: source kind plus its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub kind: SourceKind,
    pub symbol: Option<String>,
    pub params: String,
}

impl FetchKey {
    pub fn quote(symbol: &str) -> Self {
        Self {
            kind: SourceKind::Quote,
            symbol: Some(symbol.to_uppercase()),
            params: String::new(),
        }
    }

    pub fn price_history(symbol: &str, range: &str) -> Self {
        Self {
            kind: SourceKind::PriceHistory,
            symbol: Some(symbol.to_uppercase()),
            params: range.to_string(),
        }
    }

    pub fn indicator(symbol: &str, label: &str) -> Self {
        Self {
            kind: SourceKind::Indicator,
            symbol: Some(symbol.to_uppercase()),
            params: label.to_string(),
        }
    }

    /// News feeds are global: the key carries the feed id, never a symbol
    pub fn news(feed_id: &str) -> Self {
        Self {
            kind: SourceKind::News,
            symbol: None,
            params: feed_id.to_string(),
        }
    }

    /// Whether this key belongs to `symbol` and must be dropped on a symbol switch
    pub fn is_scoped_to(&self, symbol: &str) -> bool {
        self.kind.is_symbol_scoped()
            && self
                .symbol
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Whether the task behind this key may keep running while `active` is selected.
    ///
    /// Global keys are always active; without a selection every key is.
    pub fn is_active_for(&self, active: Option<&str>) -> bool {
        match active {
            Some(symbol) if self.kind.is_symbol_scoped() => self.is_scoped_to(symbol),
            _ => true,
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(symbol) = &self.symbol {
            write!(f, ":{}", symbol)?;
        }
        if !self.params.is_empty() {
            write!(f, ":{}", self.params)?;
        }
        Ok(())
    }
}
