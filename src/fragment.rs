//! Encodes the active view as a query-string fragment, the same
//! `#sort=...&order=...&filter=...` shape the digest page puts after the
//! hash, so a view can be copied out of the app and pasted back in.

use std::str::FromStr;

use url::form_urlencoded;

use crate::view::{Direction, SortKey, ViewState};

pub const KEY_SORT: &str = "sort";
pub const KEY_ORDER: &str = "order";
pub const KEY_FILTER: &str = "filter";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FragmentError {
    #[error("unknown sort key: {0}")]
    UnknownSortKey(String),
    #[error("unknown sort order: {0}")]
    UnknownDirection(String),
    #[error("filter is not a positive integer: {0}")]
    BadFilter(String),
}

/// Result of decoding a fragment. Bad values never abort the whole decode;
/// each one becomes a warning and its key falls back to absent, so a
/// malformed or future-incompatible link degrades to the default view.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    pub state: ViewState,
    pub warnings: Vec<FragmentError>,
}

pub fn decode(fragment: &str) -> Decoded {
    let raw = fragment.strip_prefix('#').unwrap_or(fragment);
    let mut sort_key: Option<SortKey> = None;
    let mut direction: Option<Direction> = None;
    let mut filter: Option<u32> = None;
    let mut warnings = Vec::new();

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            KEY_SORT => match SortKey::from_str(&value) {
                Ok(parsed) => sort_key = Some(parsed),
                Err(err) => warnings.push(FragmentError::UnknownSortKey(err.0)),
            },
            KEY_ORDER => match Direction::from_str(&value) {
                Ok(parsed) => direction = Some(parsed),
                Err(err) => warnings.push(FragmentError::UnknownDirection(err.0)),
            },
            KEY_FILTER => match value.parse::<u32>() {
                Ok(parsed) if parsed > 0 => filter = Some(parsed),
                _ => warnings.push(FragmentError::BadFilter(value.into_owned())),
            },
            _ => {}
        }
    }

    // A sort key without an order means descending, the first-activation
    // state of the toggle cycle.
    let sort = sort_key.map(|key| (key, direction.unwrap_or(Direction::Desc)));

    Decoded {
        state: ViewState {
            sort,
            filter_top: filter,
        },
        warnings,
    }
}

/// Serialize a view from scratch. Absent parts of the state produce no
/// parameter at all.
pub fn encode(state: &ViewState) -> String {
    merge("", state)
}

/// Merge the view into an existing fragment, preserving parameters the view
/// controller does not own and dropping managed keys whose value is absent.
pub fn merge(existing: &str, state: &ViewState) -> String {
    let raw = existing.strip_prefix('#').unwrap_or(existing);
    let managed = |key: &str| matches!(key, KEY_SORT | KEY_ORDER | KEY_FILTER);

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut wrote_sort = false;
    let mut wrote_filter = false;

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if !managed(&key) {
            serializer.append_pair(&key, &value);
            continue;
        }
        match key.as_ref() {
            KEY_SORT | KEY_ORDER if !wrote_sort => {
                wrote_sort = true;
                if let Some((sort_key, direction)) = state.sort {
                    serializer.append_pair(KEY_SORT, sort_key.as_str());
                    serializer.append_pair(KEY_ORDER, direction.as_str());
                }
            }
            KEY_FILTER if !wrote_filter => {
                wrote_filter = true;
                if let Some(top_n) = state.filter_top {
                    serializer.append_pair(KEY_FILTER, &top_n.to_string());
                }
            }
            _ => {}
        }
    }

    if !wrote_sort {
        if let Some((sort_key, direction)) = state.sort {
            serializer.append_pair(KEY_SORT, sort_key.as_str());
            serializer.append_pair(KEY_ORDER, direction.as_str());
        }
    }
    if !wrote_filter {
        if let Some(top_n) = state.filter_top {
            serializer.append_pair(KEY_FILTER, &top_n.to_string());
        }
    }

    serializer.finish()
}

/// Result of restoring a stored fragment against a loaded item set.
#[derive(Debug)]
pub struct Restored {
    pub state: ViewState,
    pub threshold: u32,
    pub warnings: Vec<FragmentError>,
}

/// Apply a stored fragment to a freshly loaded item list: the filter is
/// computed first, then the sort, matching the page's load order.
pub fn restore(items: &mut Vec<crate::digest::Item>, fragment: &str) -> Restored {
    let Decoded { state, warnings } = decode(fragment);
    let threshold = state
        .filter_top
        .map(|top_n| crate::view::score_threshold(items, top_n))
        .unwrap_or(0);
    if let Some((key, direction)) = state.sort {
        crate::view::apply_sort(items, key, direction);
    }
    Restored {
        state,
        threshold,
        warnings,
    }
}

/// The fragment as it would appear in a shared link.
pub fn with_hash(fragment: &str) -> String {
    if fragment.is_empty() {
        String::new()
    } else {
        format!("#{fragment}")
    }
}
