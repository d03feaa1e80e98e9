//! List-continuation hints for content carried across a page boundary.
//!
//! When a list item is split, the part carried to the next page gets the
//! follow-up class so a renderer can suppress a second bullet or ordinal.
//! When an ordered list is split, its `start` attribute is advanced by the
//! number of items already emitted so numbering stays continuous.

use folio::{Document, NodeId};

/// Class added to a list item that continues from a previous page.
pub const FOLLOW_UP_CLASS: &str = "follow-up";

/// Tag `node` with the follow-up marker if it is a list item.
///
/// Returns `true` when the marker was newly added.
pub fn mark_follow_up(doc: &mut Document, node: NodeId) -> bool {
    if !doc.is_element(node, "li") {
        return false;
    }
    doc.element_mut(node)
        .is_some_and(|el| el.add_class(FOLLOW_UP_CLASS))
}

/// Walk from `node` up to (not including) `stop` and tag every list item
/// ancestor with the follow-up marker. Returns the number of items tagged.
pub fn mark_ancestor_list_items(doc: &mut Document, node: NodeId, stop: NodeId) -> usize {
    let items: Vec<NodeId> = doc
        .ancestors(node)
        .take_while(|ancestor| *ancestor != stop)
        .filter(|ancestor| doc.is_element(*ancestor, "li"))
        .collect();
    items
        .into_iter()
        .filter(|item| mark_follow_up(doc, *item))
        .count()
}

/// Visible start index of an ordered list (`start` attribute, default 1).
pub fn list_start(doc: &Document, list: NodeId) -> i64 {
    match doc.attr(list, "start").map(str::trim) {
        Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
            log::warn!("ignoring unparsable ordered list start {:?}", raw);
            1
        }),
        None => 1,
    }
}

/// Advance an ordered list's `start` by `consumed` items.
///
/// No-op for anything but `ol` and for `consumed == 0`. Returns the new start.
pub fn advance_list_start(doc: &mut Document, list: NodeId, consumed: usize) -> Option<i64> {
    if consumed == 0 || !doc.is_element(list, "ol") {
        return None;
    }
    let consumed = i64::try_from(consumed).unwrap_or(i64::MAX);
    let start = list_start(doc, list).saturating_add(consumed);
    doc.set_attr(list, "start", start.to_string());
    Some(start)
}

/// Remove every follow-up marker below `root`. Used to compare emitted pages
/// against the original content.
pub fn strip_follow_up(doc: &mut Document, root: NodeId) {
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let Some(el) = doc.element_mut(node) {
            el.remove_class(FOLLOW_UP_CLASS);
        }
        pending.extend(doc.children(node));
    }
}
