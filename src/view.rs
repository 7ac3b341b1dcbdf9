use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Item;

#[derive(Debug, thiserror::Error)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

#[derive(Debug, thiserror::Error)]
#[error("unknown sort order: {0}")]
pub struct UnknownDirection(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Rank,
    Score,
    Comments,
    Time,
}

pub const SORT_KEYS: [SortKey; 4] = [
    SortKey::Rank,
    SortKey::Score,
    SortKey::Comments,
    SortKey::Time,
];

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rank => "rank",
            SortKey::Score => "score",
            SortKey::Comments => "comments",
            SortKey::Time => "time",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SortKey::Rank => "Rank",
            SortKey::Score => "Points",
            SortKey::Comments => "Comments",
            SortKey::Time => "Submit time",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rank" => Ok(SortKey::Rank),
            "score" => Ok(SortKey::Score),
            "comments" => Ok(SortKey::Comments),
            "time" => Ok(SortKey::Time),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

/// The active view configuration. Owned by the UI model, mutated only by
/// explicit user actions, and mirrored into the copyable fragment string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub sort: Option<(SortKey, Direction)>,
    pub filter_top: Option<u32>,
}

impl ViewState {
    /// Advance the toggle cycle for one sort control. Repeated activation of
    /// the same key walks Unset -> Descending -> Ascending -> Unset; a
    /// different key always starts over at Descending.
    pub fn toggle_sort(&mut self, key: SortKey) -> Option<(SortKey, Direction)> {
        self.sort = match self.sort {
            Some((k, Direction::Desc)) if k == key => Some((key, Direction::Asc)),
            Some((k, Direction::Asc)) if k == key => None,
            _ => Some((key, Direction::Desc)),
        };
        self.sort
    }

    pub fn set_filter(&mut self, top_n: Option<u32>) {
        self.filter_top = top_n.filter(|n| *n > 0);
    }
}

fn time_value(item: &Item) -> DateTime<Utc> {
    item.submitted_at.unwrap_or(DateTime::UNIX_EPOCH)
}

fn primary(key: SortKey, a: &Item, b: &Item) -> Ordering {
    match key {
        SortKey::Rank => a.rank.cmp(&b.rank),
        SortKey::Score => a.score.cmp(&b.score),
        SortKey::Comments => a.comment_count.cmp(&b.comment_count),
        SortKey::Time => time_value(a).cmp(&time_value(b)),
    }
}

/// Ascending comparison for `key`, with ties broken by ascending rank.
pub fn compare_by(key: SortKey, a: &Item, b: &Item) -> Ordering {
    match primary(key, a, b) {
        Ordering::Equal => a.rank.cmp(&b.rank),
        ordering => ordering,
    }
}

/// Signed comparison: the primary field follows `direction`, but the rank
/// tie-break stays ascending in both directions.
pub fn compare(key: SortKey, direction: Direction, a: &Item, b: &Item) -> Ordering {
    match primary(key, a, b) {
        Ordering::Equal => a.rank.cmp(&b.rank),
        ordering => direction.apply(ordering),
    }
}

/// Reorder `items` in place. Sponsored entries keep their original absolute
/// slot; only the rest are sorted. The caller re-renders from the resulting
/// vector in one pass, so there is no partially ordered presentation.
pub fn apply_sort(items: &mut Vec<Item>, key: SortKey, direction: Direction) {
    let mut pinned: Vec<(usize, Item)> = Vec::new();
    let mut regular: Vec<Item> = Vec::new();
    for (index, item) in items.drain(..).enumerate() {
        if item.sponsored {
            pinned.push((index, item));
        } else {
            regular.push(item);
        }
    }

    regular.sort_by(|a, b| compare(key, direction, a, b));

    let total = pinned.len() + regular.len();
    let mut slots: Vec<Option<Item>> = std::iter::repeat_with(|| None).take(total).collect();
    for (index, item) in pinned {
        slots[index] = Some(item);
    }
    let mut regular = regular.into_iter();
    for slot in slots.iter_mut() {
        if slot.is_none() {
            *slot = regular.next();
        }
    }
    items.extend(slots.into_iter().flatten());
}

/// Minimum score an item needs to stay visible under a top-N filter.
/// Zero means show everything, which is also what a too-large N degrades to.
pub fn score_threshold(items: &[Item], top_n: u32) -> u32 {
    if top_n == 0 {
        return 0;
    }
    let mut scores: Vec<u32> = items
        .iter()
        .filter(|item| !item.sponsored)
        .map(|item| item.score)
        .collect();
    scores.sort_unstable_by(|a, b| b.cmp(a));
    let nth = top_n as usize;
    if nth < scores.len() {
        scores[nth - 1]
    } else {
        0
    }
}

/// Sponsored items carry no score and are never hidden by a filter.
pub fn is_visible(item: &Item, threshold: u32) -> bool {
    item.sponsored || item.score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(rank: u32, score: u32) -> Item {
        Item {
            rank,
            score,
            comment_count: 0,
            submitted_at: None,
            sponsored: false,
            title: format!("item {rank}"),
            url: String::new(),
            permalink: format!("https://example.com/{rank}"),
            summary: String::new(),
            author: String::new(),
            feature_image: None,
            favicon: None,
        }
    }

    fn sponsored(rank: u32) -> Item {
        Item {
            sponsored: true,
            ..item(rank, 0)
        }
    }

    fn ranks(items: &[Item]) -> Vec<u32> {
        items.iter().map(|item| item.rank).collect()
    }

    #[test]
    fn rank_sort_twice_restores_original_order() {
        let mut items = vec![item(3, 0), item(1, 0), item(2, 0)];
        apply_sort(&mut items, SortKey::Rank, Direction::Asc);
        assert_eq!(ranks(&items), vec![1, 2, 3]);
        apply_sort(&mut items, SortKey::Rank, Direction::Desc);
        apply_sort(&mut items, SortKey::Rank, Direction::Asc);
        apply_sort(&mut items, SortKey::Rank, Direction::Desc);
        apply_sort(&mut items, SortKey::Rank, Direction::Asc);
        assert_eq!(ranks(&items), vec![1, 2, 3]);
    }

    #[test]
    fn score_ties_break_by_ascending_rank_in_both_directions() {
        let mut items = vec![item(4, 50), item(2, 50), item(9, 50)];
        apply_sort(&mut items, SortKey::Score, Direction::Desc);
        assert_eq!(ranks(&items), vec![2, 4, 9]);
        apply_sort(&mut items, SortKey::Score, Direction::Asc);
        assert_eq!(ranks(&items), vec![2, 4, 9]);
    }

    #[test]
    fn worked_example_score_descending_then_top_two() {
        let mut items = vec![
            item(1, 10),
            item(2, 50),
            item(3, 30),
            item(4, 50),
            item(5, 20),
        ];
        apply_sort(&mut items, SortKey::Score, Direction::Desc);
        assert_eq!(ranks(&items), vec![2, 4, 3, 5, 1]);

        let threshold = score_threshold(&items, 2);
        assert_eq!(threshold, 50);
        let visible: Vec<u32> = items
            .iter()
            .filter(|i| is_visible(i, threshold))
            .map(|i| i.rank)
            .collect();
        assert_eq!(visible, vec![2, 4]);
    }

    #[test]
    fn sponsored_items_keep_their_slot_under_every_sort() {
        let build = || {
            vec![
                item(1, 10),
                sponsored(2),
                item(3, 30),
                sponsored(4),
                item(5, 20),
            ]
        };
        for key in SORT_KEYS {
            for direction in [Direction::Asc, Direction::Desc] {
                let mut items = build();
                apply_sort(&mut items, key, direction);
                assert!(items[1].sponsored, "{key:?} {direction:?}");
                assert!(items[3].sponsored, "{key:?} {direction:?}");
                assert_eq!(items[1].rank, 2);
                assert_eq!(items[3].rank, 4);
            }
        }
    }

    #[test]
    fn time_sort_treats_missing_timestamps_as_earliest() {
        let stamp = |h| Utc.with_ymd_and_hms(2026, 1, 5, h, 0, 0).unwrap();
        let mut items = vec![
            Item {
                submitted_at: Some(stamp(8)),
                ..item(1, 0)
            },
            item(2, 0),
            Item {
                submitted_at: Some(stamp(12)),
                ..item(3, 0)
            },
        ];
        apply_sort(&mut items, SortKey::Time, Direction::Asc);
        assert_eq!(ranks(&items), vec![2, 1, 3]);
        apply_sort(&mut items, SortKey::Time, Direction::Desc);
        assert_eq!(ranks(&items), vec![3, 1, 2]);
    }

    #[test]
    fn threshold_ties_keep_every_tied_item_visible() {
        let items = vec![item(1, 80), item(2, 50), item(3, 50), item(4, 10)];
        let threshold = score_threshold(&items, 2);
        assert_eq!(threshold, 50);
        let visible = items.iter().filter(|i| is_visible(i, threshold)).count();
        assert_eq!(visible, 3);
    }

    #[test]
    fn oversized_or_zero_top_n_shows_everything() {
        let items = vec![item(1, 5), sponsored(2), item(3, 9)];
        assert_eq!(score_threshold(&items, 0), 0);
        assert_eq!(score_threshold(&items, 2), 0);
        assert_eq!(score_threshold(&items, 10), 0);
        assert!(items
            .iter()
            .all(|i| is_visible(i, score_threshold(&items, 10))));
    }

    #[test]
    fn sponsored_items_ignore_the_filter() {
        let items = vec![item(1, 100), item(2, 90), item(3, 80), sponsored(4)];
        let threshold = score_threshold(&items, 1);
        assert_eq!(threshold, 100);
        assert!(is_visible(&items[3], threshold));
        assert!(!is_visible(&items[2], threshold));
    }

    #[test]
    fn toggle_cycle_per_control() {
        let mut state = ViewState::default();
        assert_eq!(
            state.toggle_sort(SortKey::Score),
            Some((SortKey::Score, Direction::Desc))
        );
        assert_eq!(
            state.toggle_sort(SortKey::Score),
            Some((SortKey::Score, Direction::Asc))
        );
        assert_eq!(state.toggle_sort(SortKey::Score), None);
        assert_eq!(
            state.toggle_sort(SortKey::Score),
            Some((SortKey::Score, Direction::Desc))
        );
    }

    #[test]
    fn switching_keys_resets_to_descending() {
        let mut state = ViewState::default();
        state.toggle_sort(SortKey::Score);
        state.toggle_sort(SortKey::Score);
        assert_eq!(state.sort, Some((SortKey::Score, Direction::Asc)));
        assert_eq!(
            state.toggle_sort(SortKey::Comments),
            Some((SortKey::Comments, Direction::Desc))
        );
        // The old key's position in the cycle is forgotten.
        assert_eq!(
            state.toggle_sort(SortKey::Score),
            Some((SortKey::Score, Direction::Desc))
        );
    }

    #[test]
    fn set_filter_normalizes_zero_to_none() {
        let mut state = ViewState::default();
        state.set_filter(Some(0));
        assert_eq!(state.filter_top, None);
        state.set_filter(Some(10));
        assert_eq!(state.filter_top, Some(10));
        state.set_filter(None);
        assert_eq!(state.filter_top, None);
    }
}
