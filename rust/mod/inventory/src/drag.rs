//! Transient drag-and-drop state.

use tracing::{debug, warn};

use crate::executor::{MoveExecutor, MoveOutcome};
use crate::grouping::{GroupingMode, expand_selection};
use crate::model::EntityId;
use crate::store::EntityStore;
use crate::validator::{DropTarget, MoveCheck, validate_move};

/// One drag gesture: start, any number of hovers, then drop or end.
/// The session is cleared on drop and on end whatever the outcome.
#[derive(Debug, Default)]
pub struct DragSession {
    dragged: Vec<EntityId>,
    hovered: Option<String>,
    mode: GroupingMode,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a drag from a JSON payload (an array of node ids). Virtual
    /// node ids are expanded to their members. A malformed payload is
    /// logged and leaves the session idle.
    pub fn start(&mut self, store: &EntityStore, payload: &str, mode: GroupingMode) -> bool {
        self.reset();
        let ids: Vec<String> = match serde_json::from_str(payload) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("ignoring malformed drag payload: {}", e);
                return false;
            }
        };
        self.start_with(store, &ids, mode)
    }

    /// `start` under the grouping the explorer is configured to open with.
    pub fn start_default(&mut self, store: &EntityStore, payload: &str) -> bool {
        let mode = store.config().default_grouping;
        self.start(store, payload, mode)
    }

    pub fn start_with(&mut self, store: &EntityStore, ids: &[String], mode: GroupingMode) -> bool {
        self.reset();
        self.dragged = expand_selection(store, ids, mode);
        self.mode = mode;
        debug!("drag started with {} item(s)", self.dragged.len());
        !self.dragged.is_empty()
    }

    pub fn is_active(&self) -> bool {
        !self.dragged.is_empty()
    }

    pub fn dragged(&self) -> &[EntityId] {
        &self.dragged
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Record the node under the pointer and preview the drop.
    pub fn hover(&mut self, store: &EntityStore, node_id: &str) -> MoveCheck {
        self.hovered = Some(node_id.to_string());
        let target = DropTarget::resolve(store, node_id, self.mode);
        validate_move(store, &self.dragged, &target)
    }

    /// Drop on `node_id` and hand the move to `executor`.
    pub fn drop_on(
        &mut self,
        store: &mut EntityStore,
        executor: &mut MoveExecutor,
        node_id: &str,
    ) -> MoveOutcome {
        let target = DropTarget::resolve(store, node_id, self.mode);
        let dragged = std::mem::take(&mut self.dragged);
        self.reset();
        executor.execute(store, &dragged, &target)
    }

    /// Drag cancelled or finished elsewhere.
    pub fn end(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.dragged.clear();
        self.hovered = None;
        self.mode = GroupingMode::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorerConfigPatch;
    use crate::model::{DeviceAttributes, EntityAttributes, EntityKind, NewEntity};
    use crate::validator::MoveRejection;

    fn warehouse() -> EntityStore {
        let mut s = EntityStore::new();
        s.create(NewEntity::new(EntityAttributes::for_kind(EntityKind::Department), "Receiving").with_id("D1"))
            .unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "Shelf 1").with_id("BIN1").under("D1"))
            .unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "Shelf 2").with_id("BIN2").under("D1"))
            .unwrap();
        for (id, sku) in [("d1", "A"), ("d2", "A")] {
            s.create(
                NewEntity::new(
                    EntityAttributes::Device(DeviceAttributes {
                        sku: Some(sku.into()),
                        ..Default::default()
                    }),
                    id,
                )
                .with_id(id)
                .under("BIN1"),
            )
            .unwrap();
        }
        s
    }

    #[test]
    fn malformed_payload_is_a_no_op() {
        let s = warehouse();
        let mut drag = DragSession::new();
        assert!(!drag.start(&s, "not json", GroupingMode::None));
        assert!(!drag.start(&s, r#"{"ids":["d1"]}"#, GroupingMode::None));
        assert!(!drag.is_active());
    }

    #[test]
    fn hover_previews_and_drop_resets() {
        let mut s = warehouse();
        let mut ex = MoveExecutor::new();
        let mut drag = DragSession::new();
        assert!(drag.start(&s, r#"["d1"]"#, GroupingMode::None));

        assert_eq!(drag.hover(&s, "BIN1"), MoveCheck::NoOp);
        assert_eq!(
            drag.hover(&s, "D1"),
            MoveCheck::Allowed
        );
        assert_eq!(
            drag.hover(&s, "d1"),
            MoveCheck::Rejected(MoveRejection::SelfDrop("d1".into()))
        );
        assert_eq!(drag.hovered(), Some("d1"));

        let out = drag.drop_on(&mut s, &mut ex, "BIN2");
        assert!(matches!(out, MoveOutcome::Moved { .. }));
        assert!(!drag.is_active());
        assert_eq!(drag.hovered(), None);
        assert_eq!(s.parent("d1").unwrap().id, "BIN2");
    }

    #[test]
    fn dragging_a_group_moves_its_members() {
        let mut s = warehouse();
        let mut ex = MoveExecutor::new();
        let mut drag = DragSession::new();
        assert!(drag.start(&s, r#"["virtual-group-A-d1"]"#, GroupingMode::Sku));
        assert_eq!(drag.dragged(), &["d1".to_string(), "d2".to_string()]);

        let out = drag.drop_on(&mut s, &mut ex, "BIN2");
        assert!(matches!(out, MoveOutcome::NeedsConfirmation(_)));
        assert!(!drag.is_active());
        assert!(matches!(ex.confirm(&mut s), MoveOutcome::Moved { .. }));
        assert_eq!(s.get("BIN2").unwrap().children.len(), 2);
    }

    #[test]
    fn default_start_uses_configured_grouping() {
        let mut s = warehouse();
        let mut drag = DragSession::new();
        assert!(!drag.start_default(&s, r#"["virtual-group-A-d1"]"#));

        s.update_config(ExplorerConfigPatch {
            default_grouping: Some(GroupingMode::Sku),
            ..Default::default()
        });
        assert!(drag.start_default(&s, r#"["virtual-group-A-d1"]"#));
        assert_eq!(drag.dragged(), &["d1".to_string(), "d2".to_string()]);
        assert_eq!(drag.hover(&s, "virtual-group-A-d1"), MoveCheck::NoOp);
    }

    #[test]
    fn end_clears_state() {
        let s = warehouse();
        let mut drag = DragSession::new();
        drag.start(&s, r#"["d1","d2"]"#, GroupingMode::None);
        drag.hover(&s, "BIN2");
        drag.end();
        assert!(!drag.is_active());
        assert!(drag.hovered().is_none());
    }
}
