//! Visible row order and shift-click range selection.

use std::collections::HashSet;

use crate::grouping::{GroupingMode, VirtualNode, project};
use crate::hierarchy::{SearchFilter, Traversal};
use crate::model::EntityId;
use crate::store::EntityStore;

/// One visible line of the explorer tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub depth: usize,
    pub expanded: bool,
    /// Members for a virtual node row; empty for entity rows.
    pub member_ids: Vec<EntityId>,
    pub is_virtual: bool,
}

impl Row {
    fn entity(id: &str, depth: usize, expanded: bool) -> Self {
        Self {
            id: id.to_string(),
            depth,
            expanded,
            member_ids: Vec::new(),
            is_virtual: false,
        }
    }

    fn group(node: &VirtualNode, depth: usize, expanded: bool) -> Self {
        Self {
            id: node.id.clone(),
            depth,
            expanded,
            member_ids: node.member_ids.clone(),
            is_virtual: true,
        }
    }
}

/// Rows in display order: depth first, roots in store order, real
/// children before virtual nodes. Children are listed only for ids in
/// `expanded`; virtual node members only when the node itself is expanded.
pub fn flatten_visible(
    store: &EntityStore,
    filter: &SearchFilter,
    expanded: &HashSet<String>,
    mode: GroupingMode,
) -> Vec<Row> {
    let mut traversal = Traversal::new(store, filter);
    let mut rows = Vec::new();
    for root in store.roots() {
        visit(store, &mut traversal, expanded, mode, root, 0, &mut rows);
    }
    rows
}

fn visit(
    store: &EntityStore,
    traversal: &mut Traversal<'_>,
    expanded: &HashSet<String>,
    mode: GroupingMode,
    id: &str,
    depth: usize,
    rows: &mut Vec<Row>,
) {
    if !traversal.is_visible(id) {
        return;
    }
    let open = expanded.contains(id);
    rows.push(Row::entity(id, depth, open));
    if !open {
        return;
    }
    let Ok(projection) = project(store, id, mode) else {
        return;
    };
    for child in &projection.real_children {
        visit(store, traversal, expanded, mode, child, depth + 1, rows);
    }
    for node in &projection.groups {
        let any_visible = node.member_ids.iter().any(|m| traversal.is_visible(m));
        if !any_visible && !node.member_ids.is_empty() {
            continue;
        }
        let node_open = expanded.contains(&node.id);
        rows.push(Row::group(node, depth + 1, node_open));
        if node_open {
            for member in &node.member_ids {
                visit(store, traversal, expanded, node.child_mode(), member, depth + 2, rows);
            }
        }
    }
}

/// Real entity ids between `anchor` and `target` inclusive, in row
/// order. Collapsed virtual rows contribute their members. Returns an
/// empty list when either row is not visible.
pub fn range_select(rows: &[Row], anchor: &str, target: &str) -> Vec<EntityId> {
    let (Some(a), Some(b)) = (
        rows.iter().position(|r| r.id == anchor),
        rows.iter().position(|r| r.id == target),
    ) else {
        return Vec::new();
    };
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut out: Vec<EntityId> = Vec::new();
    let mut push = |id: &String| {
        if !out.contains(id) {
            out.push(id.clone());
        }
    };
    for row in &rows[lo..=hi] {
        if !row.is_virtual {
            push(&row.id);
        } else if !row.expanded {
            row.member_ids.iter().for_each(&mut push);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::DeviceFilter;
    use crate::model::{DeviceAttributes, EntityAttributes, EntityKind, NewEntity};

    fn device(s: &mut EntityStore, id: &str, parent: &str, sku: &str, tested: bool) {
        s.create(
            NewEntity::new(
                EntityAttributes::Device(DeviceAttributes {
                    sku: Some(sku.into()),
                    tested,
                    ..Default::default()
                }),
                id,
            )
            .with_id(id)
            .under(parent),
        )
        .unwrap();
    }

    /// D1 → BIN1 → {a1, a2 (A), b1 (B)}; D1 → BIN2 → c1 (C)
    fn warehouse() -> EntityStore {
        let mut s = EntityStore::new();
        s.create(NewEntity::new(EntityAttributes::for_kind(EntityKind::Department), "Receiving").with_id("D1"))
            .unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "Shelf 1").with_id("BIN1").under("D1"))
            .unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "Shelf 2").with_id("BIN2").under("D1"))
            .unwrap();
        device(&mut s, "a1", "BIN1", "A", true);
        device(&mut s, "a2", "BIN1", "A", false);
        device(&mut s, "b1", "BIN1", "B", false);
        device(&mut s, "c1", "BIN2", "C", true);
        s
    }

    fn open(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn row_ids(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn collapsed_tree_shows_roots_only() {
        let s = warehouse();
        let rows = flatten_visible(&s, &SearchFilter::default(), &HashSet::new(), GroupingMode::None);
        assert_eq!(row_ids(&rows), vec!["D1"]);
    }

    #[test]
    fn expanded_tree_without_grouping() {
        let s = warehouse();
        let rows = flatten_visible(
            &s,
            &SearchFilter::default(),
            &open(&["D1", "BIN1", "BIN2"]),
            GroupingMode::None,
        );
        assert_eq!(row_ids(&rows), vec!["D1", "BIN1", "a1", "a2", "b1", "BIN2", "c1"]);
        assert_eq!(rows[2].depth, 2);
    }

    #[test]
    fn grouped_rows_and_range_over_collapsed_group() {
        let s = warehouse();
        let rows = flatten_visible(
            &s,
            &SearchFilter::default(),
            &open(&["D1", "BIN1", "BIN2"]),
            GroupingMode::Sku,
        );
        assert_eq!(
            row_ids(&rows),
            vec![
                "D1",
                "BIN1",
                "virtual-group-A-a1",
                "virtual-group-B-b1",
                "BIN2",
                "virtual-group-C-c1"
            ]
        );
        let picked = range_select(&rows, "virtual-group-A-a1", "BIN2");
        assert_eq!(picked, vec!["a1", "a2", "b1", "BIN2"]);
    }

    #[test]
    fn expanded_group_lists_members() {
        let s = warehouse();
        let rows = flatten_visible(
            &s,
            &SearchFilter::default(),
            &open(&["D1", "BIN1", "virtual-group-A-a1"]),
            GroupingMode::Sku,
        );
        assert_eq!(
            row_ids(&rows),
            vec!["D1", "BIN1", "virtual-group-A-a1", "a1", "a2", "virtual-group-B-b1", "BIN2"]
        );
        // Backwards range; the expanded group row adds nothing itself.
        let picked = range_select(&rows, "a2", "virtual-group-A-a1");
        assert_eq!(picked, vec!["a1", "a2"]);
    }

    #[test]
    fn filter_hides_rows() {
        let s = warehouse();
        let filter = SearchFilter::default().with(DeviceFilter::Tested);
        let rows = flatten_visible(&s, &filter, &open(&["D1", "BIN1", "BIN2"]), GroupingMode::None);
        assert_eq!(row_ids(&rows), vec!["D1", "BIN1", "a1", "BIN2", "c1"]);
    }

    #[test]
    fn range_with_unknown_row_is_empty() {
        let rows = vec![Row::entity("x", 0, false)];
        assert!(range_select(&rows, "x", "ghost").is_empty());
        assert_eq!(range_select(&rows, "x", "x"), vec!["x"]);
    }
}
