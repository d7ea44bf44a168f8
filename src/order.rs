//! Column ordering: merges static and dynamic ordering hints into a layout.
//!
//! Ranks are hints, not positions. Every candidate column (static header or
//! dynamic key) gets an optional rank from its own ranker. Ranked columns sort
//! ascending by `(rank, header)` so equal ranks interleave alphabetically
//! regardless of origin, and gaps between ranks collapse. Unranked columns
//! follow: static headers in declaration order, then dynamic keys
//! alphabetically. Positions are assigned 1..N over that sequence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use log::debug;

use crate::error::{Result, SheetError};

pub type Rank = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnOrigin {
    Static,
    Dynamic,
}

/// A candidate column with its ordering hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub header: String,
    pub rank: Option<Rank>,
    pub origin: ColumnOrigin,
}

/// Ranks static columns by header.
pub trait StaticRanker {
    fn rank_of(&self, header: &str) -> Option<Rank>;
}

impl<F> StaticRanker for F
where
    F: Fn(&str) -> Option<Rank>,
{
    fn rank_of(&self, header: &str) -> Option<Rank> {
        self(header)
    }
}

impl StaticRanker for BTreeMap<String, Rank> {
    fn rank_of(&self, header: &str) -> Option<Rank> {
        self.get(header).copied()
    }
}

impl StaticRanker for HashMap<String, Rank> {
    fn rank_of(&self, header: &str) -> Option<Rank> {
        self.get(header).copied()
    }
}

/// Ranks the dynamic keys of a batch.
///
/// `seed` holds every observed key mapped to its 1-based alphabetical
/// position. The returned map may overwrite, drop, or keep those entries; a
/// key missing from the result is unranked and entries for keys that were not
/// observed are ignored.
pub trait DynamicRanker {
    fn ranks(&self, seed: BTreeMap<String, Rank>) -> BTreeMap<String, Rank>;
}

impl<F> DynamicRanker for F
where
    F: Fn(BTreeMap<String, Rank>) -> BTreeMap<String, Rank>,
{
    fn ranks(&self, seed: BTreeMap<String, Rank>) -> BTreeMap<String, Rank> {
        self(seed)
    }
}

/// Fixed ranks, such as a persisted preferred order for some keys.
impl DynamicRanker for BTreeMap<String, Rank> {
    fn ranks(&self, seed: BTreeMap<String, Rank>) -> BTreeMap<String, Rank> {
        seed.into_keys()
            .filter_map(|key| self.get(&key).map(|rank| (key, *rank)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutColumn {
    pub header: String,
    /// 1-based column position.
    pub position: usize,
    pub origin: ColumnOrigin,
    pub rank: Option<Rank>,
}

/// Resolved header order with contiguous 1-based positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnLayout {
    columns: Vec<LayoutColumn>,
}

impl ColumnLayout {
    fn from_entries(entries: impl IntoIterator<Item = OrderEntry>) -> Self {
        let columns = entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| LayoutColumn {
                header: entry.header,
                position: idx + 1,
                origin: entry.origin,
                rank: entry.rank,
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[LayoutColumn] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    pub fn position_of(&self, header: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.header == header)
            .map(|c| c.position)
    }

    pub fn header_at(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|idx| self.columns.get(idx))
            .map(|c| c.header.as_str())
    }

    /// Header to 1-based position, the shape grid writers consume.
    pub fn header_map(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .map(|c| (c.header.clone(), c.position))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn seed_ranks(dynamic_keys: &BTreeSet<String>) -> BTreeMap<String, Rank> {
    dynamic_keys
        .iter()
        .enumerate()
        .map(|(idx, key)| (key.clone(), idx as Rank + 1))
        .collect()
}

/// Merge static headers and dynamic keys into one deterministic layout.
///
/// Fails with a configuration error when a static header is declared twice or
/// a dynamic key has the same name as a static header.
pub fn resolve_layout(
    static_headers: &[String],
    static_ranker: Option<&dyn StaticRanker>,
    dynamic_keys: &BTreeSet<String>,
    dynamic_ranker: Option<&dyn DynamicRanker>,
) -> Result<ColumnLayout> {
    let mut declared = HashSet::with_capacity(static_headers.len());
    for header in static_headers {
        if !declared.insert(header.as_str()) {
            return Err(SheetError::configuration(format!(
                "Static header '{header}' is declared more than once"
            )));
        }
    }
    if let Some(collision) = dynamic_keys.iter().find(|k| declared.contains(k.as_str())) {
        return Err(SheetError::configuration(format!(
            "Dynamic key '{collision}' collides with a static column header"
        )));
    }

    let dynamic_ranks = match dynamic_ranker {
        Some(ranker) => ranker.ranks(seed_ranks(dynamic_keys)),
        None => BTreeMap::new(),
    };

    let candidates = static_headers
        .iter()
        .map(|header| OrderEntry {
            header: header.clone(),
            rank: static_ranker.and_then(|r| r.rank_of(header)),
            origin: ColumnOrigin::Static,
        })
        .chain(dynamic_keys.iter().map(|key| OrderEntry {
            header: key.clone(),
            rank: dynamic_ranks.get(key).copied(),
            origin: ColumnOrigin::Dynamic,
        }));

    let layout = arrange(candidates);
    debug!("Resolved column layout: {:?}", layout.headers());
    Ok(layout)
}

fn arrange(candidates: impl Iterator<Item = OrderEntry>) -> ColumnLayout {
    let (ranked, unranked): (Vec<_>, Vec<_>) = candidates.partition(|e| e.rank.is_some());
    let ranked = ranked
        .into_iter()
        .sorted_by(|a, b| (a.rank, &a.header).cmp(&(b.rank, &b.header)));
    let (unranked_static, unranked_dynamic): (Vec<_>, Vec<_>) = unranked
        .into_iter()
        .partition(|e| e.origin == ColumnOrigin::Static);
    let unranked_dynamic = unranked_dynamic
        .into_iter()
        .sorted_by(|a, b| a.header.cmp(&b.header));

    ColumnLayout::from_entries(ranked.chain(unranked_static).chain(unranked_dynamic))
}
