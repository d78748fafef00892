//! Entity store, the single owner of the warehouse hierarchy.
//!
//! Entities live in an id-keyed arena. Parent/child links are kept on
//! both sides (`parent_id` and `children`), and every mutation goes
//! through the methods below so the two sides never drift apart.
//! Structural mutations are reported to history subscribers.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use stockroom_core::{ServiceError, new_id, now_rfc3339};

use crate::config::{ExplorerConfig, ExplorerConfigPatch};
use crate::model::{
    Entity, EntityAttributes, EntityId, EntityKind, EntityPatch, HistoryAction, HistoryRecord,
    NewEntity, Queue,
};

/// Callback receiving audit records.
pub type HistoryHandler = Arc<dyn Fn(&HistoryRecord) + Send + Sync>;

/// Handle returned by [`EntityStore::subscribe_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Input for [`EntityStore::box_entities`].
#[derive(Debug, Clone)]
pub struct BoxRequest {
    /// Id for the new box; generated when `None`.
    pub box_id: Option<EntityId>,
    pub label: String,
    pub barcode: Option<String>,
    pub parent_id: EntityId,
    pub member_ids: Vec<EntityId>,
}

/// Where an entity was before a move, enough to put it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorPlacement {
    pub id: EntityId,
    pub parent_id: Option<EntityId>,
    pub index: usize,
    /// Device lane before the move, when the move changed it.
    pub queue: Option<Option<Queue>>,
}

pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    roots: Vec<EntityId>,
    config: ExplorerConfig,
    handlers: Vec<(SubscriptionId, HistoryHandler)>,
    next_subscription: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_config(ExplorerConfig::default())
    }

    pub fn with_config(config: ExplorerConfig) -> Self {
        Self {
            entities: BTreeMap::new(),
            roots: Vec::new(),
            config,
            handlers: Vec::new(),
            next_subscription: 1,
        }
    }

    // ====================================================================
    // Reads
    // ====================================================================

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Like [`get`](Self::get) but a missing id is an error.
    pub fn require(&self, id: &str) -> Result<&Entity, ServiceError> {
        self.entities
            .get(id)
            .ok_or_else(|| ServiceError::not_found("entity", id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// All entities, ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Children of `id` in display order. Unknown ids have no children.
    pub fn children(&self, id: &str) -> Vec<&Entity> {
        self.entities
            .get(id)
            .map(|e| {
                e.children
                    .iter()
                    .filter_map(|c| self.entities.get(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent(&self, id: &str) -> Option<&Entity> {
        self.entities
            .get(id)
            .and_then(|e| e.parent_id.as_deref())
            .and_then(|p| self.entities.get(p))
    }

    /// Ancestors of `id`, nearest first. Does not include `id` itself.
    pub fn ancestors(&self, id: &str) -> Vec<&Entity> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(e) = current {
            // Guard against a corrupted chain; a tree is never deeper than its size.
            if out.len() > self.entities.len() {
                break;
            }
            out.push(e);
            current = self.parent(&e.id);
        }
        out
    }

    /// Whether `id` lies strictly below `ancestor`.
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        self.ancestors(id).iter().any(|a| a.id == ancestor)
    }

    /// Nearest Department at or above `id`.
    pub fn department_of(&self, id: &str) -> Option<&Entity> {
        let this = self.entities.get(id)?;
        if this.kind() == EntityKind::Department {
            return Some(this);
        }
        self.ancestors(id)
            .into_iter()
            .find(|e| e.kind() == EntityKind::Department)
    }

    /// Look up an entity by scanned barcode (exact, surrounding whitespace ignored).
    pub fn find_by_barcode(&self, code: &str) -> Option<&Entity> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        self.entities
            .values()
            .find(|e| e.barcode.as_deref().map(str::trim) == Some(code))
    }

    /// Look up a device by IMEI.
    pub fn find_device_by_imei(&self, imei: &str) -> Option<&Entity> {
        let imei = imei.trim();
        if imei.is_empty() {
            return None;
        }
        self.entities
            .values()
            .find(|e| e.device().and_then(|d| d.imei()) == Some(imei))
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn update_config(&mut self, patch: ExplorerConfigPatch) {
        self.config.apply(patch);
        debug!("explorer config updated: {:?}", self.config);
    }

    // ====================================================================
    // History
    // ====================================================================

    /// Register a handler called for every audit record.
    pub fn subscribe_history<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&HistoryRecord) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.handlers.push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe_history(&mut self, id: SubscriptionId) {
        self.handlers.retain(|(sid, _)| *sid != id);
    }

    fn emit(&self, action: HistoryAction, entity_id: &str, details: String) {
        if self.handlers.is_empty() {
            return;
        }
        let record = HistoryRecord {
            action_type: action,
            entity_id: entity_id.to_string(),
            details,
            timestamp: now_rfc3339(),
        };
        for (_, handler) in &self.handlers {
            handler(&record);
        }
    }

    // ====================================================================
    // Create / update
    // ====================================================================

    /// Add an entity of `kind` with default attributes under `parent_id`
    /// (`None` for a root).
    pub fn add_entity(
        &mut self,
        kind: EntityKind,
        parent_id: Option<&str>,
    ) -> Result<EntityId, ServiceError> {
        let mut input = NewEntity::new(EntityAttributes::for_kind(kind), format!("New {}", kind));
        input.parent_id = parent_id.map(str::to_string);
        self.create(input)
    }

    /// Create an entity with explicit attributes.
    pub fn create(&mut self, input: NewEntity) -> Result<EntityId, ServiceError> {
        let kind = input.attributes.kind();
        let parent_kind = match input.parent_id.as_deref() {
            Some(p) => Some(self.require(p)?.kind()),
            None => None,
        };
        if !kind.can_be_child_of(parent_kind) {
            return Err(ServiceError::Validation(format!(
                "cannot add {} under {}",
                kind,
                parent_kind.map(|k| k.as_str()).unwrap_or("root")
            )));
        }
        let label = input.label.trim().to_string();
        if label.is_empty() {
            return Err(ServiceError::Validation("label must not be empty".into()));
        }

        let id = input.id.unwrap_or_else(new_id);
        if self.entities.contains_key(&id) {
            return Err(ServiceError::Conflict(format!("entity '{}' already exists", id)));
        }

        let now = now_rfc3339();
        let entity = Entity {
            id: id.clone(),
            label,
            barcode: input.barcode.filter(|b| !b.trim().is_empty()),
            parent_id: None,
            children: Vec::new(),
            attributes: input.attributes,
            created_at: now.clone(),
            updated_at: now,
        };
        self.entities.insert(id.clone(), entity);
        self.attach(&id, input.parent_id.as_deref(), None);

        debug!("created {} {} under {:?}", kind, id, input.parent_id);
        self.emit(HistoryAction::Create, &id, format!("created {}", kind));
        Ok(id)
    }

    /// Apply a partial update. Kind-specific sections must match the
    /// entity's kind; nothing is written if any section is rejected.
    pub fn update_entity(&mut self, id: &str, patch: EntityPatch) -> Result<(), ServiceError> {
        let kind = self.require(id)?.kind();
        if patch.device.is_some() && kind != EntityKind::Device {
            return Err(ServiceError::Validation(format!(
                "device attributes cannot be set on a {}",
                kind
            )));
        }
        if patch.queues.is_some() && kind != EntityKind::Workstation {
            return Err(ServiceError::Validation(format!(
                "queues cannot be set on a {}",
                kind
            )));
        }
        if patch.rules.is_some() && kind != EntityKind::Department {
            return Err(ServiceError::Validation(format!(
                "rules cannot be set on a {}",
                kind
            )));
        }
        if let Some(label) = &patch.label {
            if label.trim().is_empty() {
                return Err(ServiceError::Validation("label must not be empty".into()));
            }
        }

        let mut changed = Vec::new();
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("entity", id))?;

        if let Some(label) = patch.label {
            entity.label = label.trim().to_string();
            changed.push("label");
        }
        if let Some(barcode) = patch.barcode {
            entity.barcode = barcode.filter(|b| !b.trim().is_empty());
            changed.push("barcode");
        }
        match (&mut entity.attributes, patch.device, patch.queues, patch.rules) {
            (EntityAttributes::Device(d), Some(dp), _, _) => {
                d.apply(dp);
                changed.push("device");
            }
            (EntityAttributes::Workstation(w), _, Some(queues), _) => {
                let mut seen = HashSet::new();
                w.queues = queues.into_iter().filter(|q| seen.insert(*q)).collect();
                changed.push("queues");
            }
            (EntityAttributes::Department(r), _, _, Some(rules)) => {
                *r = rules;
                changed.push("rules");
            }
            _ => {}
        }
        entity.updated_at = now_rfc3339();

        self.emit(HistoryAction::Update, id, format!("updated {}", changed.join(", ")));
        Ok(())
    }

    // ====================================================================
    // Delete
    // ====================================================================

    pub fn delete_entity(&mut self, id: &str) -> Result<usize, ServiceError> {
        self.delete_entities(&[id.to_string()])
    }

    /// Remove each listed entity with its whole subtree. Returns how many
    /// entities were removed. All ids must exist.
    pub fn delete_entities(&mut self, ids: &[EntityId]) -> Result<usize, ServiceError> {
        for id in ids {
            self.require(id)?;
        }

        let mut removed = 0;
        for id in ids {
            // Already gone with an earlier subtree.
            if !self.entities.contains_key(id) {
                continue;
            }
            self.detach(id);
            let subtree = self.subtree_ids(id);
            for sid in &subtree {
                self.entities.remove(sid);
            }
            removed += subtree.len();
            self.emit(
                HistoryAction::Delete,
                id,
                format!("deleted with {} descendant(s)", subtree.len() - 1),
            );
        }
        info!("deleted {} entities", removed);
        Ok(removed)
    }

    /// `id` followed by all its descendants, depth first.
    fn subtree_ids(&self, id: &str) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(e) = self.entities.get(&current) {
                stack.extend(e.children.iter().rev().cloned());
            }
            out.push(current);
        }
        out
    }

    // ====================================================================
    // Move
    // ====================================================================

    pub fn move_entity(&mut self, id: &str, new_parent_id: &str) -> Result<Vec<EntityId>, ServiceError> {
        self.move_entities(&[id.to_string()], new_parent_id)
    }

    /// Reparent every listed entity under `new_parent_id`, or none of
    /// them. Ids already under the target are left in place. Returns the
    /// ids that actually moved.
    pub fn move_entities(
        &mut self,
        ids: &[EntityId],
        new_parent_id: &str,
    ) -> Result<Vec<EntityId>, ServiceError> {
        let prior = self.relocate(ids, new_parent_id, None)?;
        Ok(prior.into_iter().map(|p| p.id).collect())
    }

    /// Check that moving `ids` under `target_id` keeps the tree valid.
    pub fn check_move(&self, ids: &[EntityId], target_id: &str) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Err(ServiceError::Validation("nothing to move".into()));
        }
        let target = self.require(target_id)?;
        for id in ids {
            let entity = self.require(id)?;
            if id == target_id {
                return Err(ServiceError::Validation(format!(
                    "cannot move '{}' into itself",
                    entity.label
                )));
            }
            if self.is_descendant(target_id, id) {
                return Err(ServiceError::Validation(format!(
                    "cannot move '{}' into its own descendant '{}'",
                    entity.label, target.label
                )));
            }
            if !entity.kind().can_be_child_of(Some(target.kind())) {
                return Err(ServiceError::Validation(format!(
                    "cannot move {} into {}",
                    entity.kind(),
                    target.kind()
                )));
            }
        }
        Ok(())
    }

    /// Move `ids` under `target_id`, optionally assigning `queue` to every
    /// moved device in the same pass. Returns where each moved entity was
    /// before, in move order.
    pub(crate) fn relocate(
        &mut self,
        ids: &[EntityId],
        target_id: &str,
        queue: Option<Queue>,
    ) -> Result<Vec<PriorPlacement>, ServiceError> {
        self.check_move(ids, target_id)?;

        let mut seen = HashSet::new();
        let mut prior = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let same_parent = entity.parent_id.as_deref() == Some(target_id);
            let queue_change = match (queue, entity.device()) {
                (Some(q), Some(d)) if d.queue != Some(q) => Some(d.queue),
                _ => None,
            };
            if same_parent && queue_change.is_none() {
                continue;
            }

            let parent_id = entity.parent_id.clone();
            let index = self.detach(id);
            self.attach(id, Some(target_id), None);
            if let (Some(q), Some(_)) = (queue, queue_change) {
                if let Some(d) = self.entities.get_mut(id).and_then(|e| e.device_mut()) {
                    d.queue = Some(q);
                }
            }
            if let Some(e) = self.entities.get_mut(id) {
                e.updated_at = now_rfc3339();
            }

            let details = match queue_change {
                Some(_) => format!("moved from {:?} to {} ({})", parent_id, target_id, queue.map(|q| q.as_str()).unwrap_or("")),
                None => format!("moved from {:?} to {}", parent_id, target_id),
            };
            self.emit(HistoryAction::Move, id, details);
            prior.push(PriorPlacement {
                id: id.clone(),
                parent_id,
                index,
                queue: queue_change,
            });
        }

        if !prior.is_empty() {
            info!("moved {} entities to {}", prior.len(), target_id);
        }
        Ok(prior)
    }

    /// Put entities back where [`relocate`](Self::relocate) found them.
    /// Placements are restored in reverse so sibling indexes line up.
    pub(crate) fn restore(&mut self, placements: &[PriorPlacement]) -> Result<(), ServiceError> {
        for p in placements {
            self.require(&p.id)?;
            if let Some(parent) = &p.parent_id {
                self.require(parent)?;
                if p.id == *parent || self.is_descendant(parent, &p.id) {
                    return Err(ServiceError::Validation(format!(
                        "cannot restore '{}' under its own descendant",
                        p.id
                    )));
                }
            }
        }

        for p in placements.iter().rev() {
            self.detach(&p.id);
            self.attach(&p.id, p.parent_id.as_deref(), Some(p.index));
            if let Some(previous) = p.queue {
                if let Some(d) = self.entities.get_mut(&p.id).and_then(|e| e.device_mut()) {
                    d.queue = previous;
                }
            }
            self.emit(
                HistoryAction::Move,
                &p.id,
                format!("restored to {:?}", p.parent_id),
            );
        }
        Ok(())
    }

    // ====================================================================
    // Box / unbox
    // ====================================================================

    /// Create a box under `parent_id` and move the members into it.
    pub fn box_entities(&mut self, req: BoxRequest) -> Result<EntityId, ServiceError> {
        if req.member_ids.is_empty() {
            return Err(ServiceError::Validation("nothing to box".into()));
        }
        let parent_kind = self.require(&req.parent_id)?.kind();
        if !EntityKind::Box.can_be_child_of(Some(parent_kind)) {
            return Err(ServiceError::Validation(format!(
                "cannot add Box under {}",
                parent_kind
            )));
        }
        for id in &req.member_ids {
            let member = self.require(id)?;
            if !member.kind().can_be_child_of(Some(EntityKind::Box)) {
                return Err(ServiceError::Validation(format!(
                    "cannot put {} '{}' into a box",
                    member.kind(),
                    member.label
                )));
            }
            if *id == req.parent_id || self.is_descendant(&req.parent_id, id) {
                return Err(ServiceError::Validation(format!(
                    "cannot box '{}' under its own descendant",
                    member.label
                )));
            }
        }
        if let Some(id) = &req.box_id {
            if self.entities.contains_key(id) {
                return Err(ServiceError::Conflict(format!("entity '{}' already exists", id)));
            }
        }

        let mut input = NewEntity::new(EntityAttributes::Box, req.label).under(req.parent_id);
        input.id = req.box_id;
        input.barcode = req.barcode;
        let box_id = self.create(input)?;
        let moved = self.relocate(&req.member_ids, &box_id, None)?;

        info!("boxed {} entities into {}", moved.len(), box_id);
        self.emit(
            HistoryAction::Box,
            &box_id,
            format!("boxed {} item(s)", moved.len()),
        );
        Ok(box_id)
    }

    /// Move the children of a box to `destination_parent_id` (default: the
    /// box's own parent), then delete the box if asked. Returns the
    /// promoted child ids.
    pub fn unbox_entities(
        &mut self,
        box_id: &str,
        destination_parent_id: Option<&str>,
        delete_box_after: bool,
    ) -> Result<Vec<EntityId>, ServiceError> {
        let the_box = self.require(box_id)?;
        if the_box.kind() != EntityKind::Box {
            return Err(ServiceError::Validation(format!(
                "'{}' is a {}, not a Box",
                the_box.label,
                the_box.kind()
            )));
        }
        let destination = match destination_parent_id.or(the_box.parent_id.as_deref()) {
            Some(d) => d.to_string(),
            None => {
                return Err(ServiceError::Validation(format!(
                    "box '{}' has no parent to unbox into",
                    the_box.label
                )));
            }
        };
        let children = the_box.children.clone();

        if !children.is_empty() {
            self.check_move(&children, &destination)?;
        } else {
            self.require(&destination)?;
        }
        if destination == box_id || self.is_descendant(&destination, box_id) {
            return Err(ServiceError::Validation("cannot unbox into the box itself".into()));
        }

        let moved: Vec<EntityId> = if children.is_empty() {
            Vec::new()
        } else {
            self.relocate(&children, &destination, None)?
                .into_iter()
                .map(|p| p.id)
                .collect()
        };
        self.emit(
            HistoryAction::Unbox,
            box_id,
            format!("unboxed {} item(s) into {}", moved.len(), destination),
        );
        if delete_box_after {
            self.delete_entity(box_id)?;
        }
        info!("unboxed {} entities from {}", moved.len(), box_id);
        Ok(moved)
    }

    // ====================================================================
    // Integrity
    // ====================================================================

    /// Verify the parent/children invariant, the parent whitelist and the
    /// absence of cycles.
    pub fn check_integrity(&self) -> Result<(), ServiceError> {
        let broken = |msg: String| Err(ServiceError::Internal(msg));

        for root in &self.roots {
            match self.entities.get(root) {
                Some(e) if e.parent_id.is_none() => {}
                _ => return broken(format!("root '{}' is missing or has a parent", root)),
            }
        }
        for e in self.entities.values() {
            let parent_kind = match &e.parent_id {
                None => {
                    if self.roots.iter().filter(|r| *r == &e.id).count() != 1 {
                        return broken(format!("'{}' has no parent but is not a root", e.id));
                    }
                    None
                }
                Some(p) => {
                    let Some(parent) = self.entities.get(p) else {
                        return broken(format!("'{}' points to missing parent '{}'", e.id, p));
                    };
                    if parent.children.iter().filter(|c| *c == &e.id).count() != 1 {
                        return broken(format!("'{}' is not listed once under '{}'", e.id, p));
                    }
                    Some(parent.kind())
                }
            };
            if !e.kind().can_be_child_of(parent_kind) {
                return broken(format!("{} '{}' sits under {:?}", e.kind(), e.id, parent_kind));
            }
            for c in &e.children {
                match self.entities.get(c) {
                    Some(child) if child.parent_id.as_deref() == Some(e.id.as_str()) => {}
                    _ => return broken(format!("child '{}' of '{}' does not point back", c, e.id)),
                }
            }
            let mut depth = 0;
            let mut cursor = e.parent_id.as_deref();
            while let Some(p) = cursor {
                depth += 1;
                if depth > self.entities.len() {
                    return broken(format!("cycle above '{}'", e.id));
                }
                cursor = self.entities.get(p).and_then(|x| x.parent_id.as_deref());
            }
        }
        Ok(())
    }

    // ====================================================================
    // Link helpers
    // ====================================================================

    /// Unlink `id` from its parent (or the root list). Returns its former
    /// position among its siblings.
    fn detach(&mut self, id: &str) -> usize {
        let parent_id = self.entities.get(id).and_then(|e| e.parent_id.clone());
        let siblings = match &parent_id {
            Some(p) => match self.entities.get_mut(p) {
                Some(parent) => &mut parent.children,
                None => return 0,
            },
            None => &mut self.roots,
        };
        let index = siblings.iter().position(|c| c == id).unwrap_or(siblings.len());
        if index < siblings.len() {
            siblings.remove(index);
        }
        if let Some(e) = self.entities.get_mut(id) {
            e.parent_id = None;
        }
        index
    }

    /// Link `id` under `parent_id` (or as a root) at `index`, appending
    /// when `None` or out of range.
    fn attach(&mut self, id: &str, parent_id: Option<&str>, index: Option<usize>) {
        let siblings = match parent_id {
            Some(p) => match self.entities.get_mut(p) {
                Some(parent) => &mut parent.children,
                None => return,
            },
            None => &mut self.roots,
        };
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, id.to_string());
        if let Some(e) = self.entities.get_mut(id) {
            e.parent_id = parent_id.map(str::to_string);
        }
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{DeviceAttributes, DevicePatch, RuleCondition, DepartmentRules};

    fn device(store: &mut EntityStore, id: &str, parent: &str) -> EntityId {
        store
            .create(
                NewEntity::new(EntityAttributes::Device(DeviceAttributes::default()), id)
                    .with_id(id)
                    .under(parent),
            )
            .unwrap()
    }

    /// Receiving (D1) → BIN1 → Dev1, Dev2; Shipping (D2) → BIN2.
    fn warehouse() -> EntityStore {
        let mut store = EntityStore::new();
        store
            .create(NewEntity::new(EntityAttributes::for_kind(EntityKind::Department), "Receiving").with_id("D1"))
            .unwrap();
        store
            .create(NewEntity::new(EntityAttributes::Bin, "B1").with_id("BIN1").under("D1"))
            .unwrap();
        store
            .create(NewEntity::new(EntityAttributes::for_kind(EntityKind::Department), "Shipping").with_id("D2"))
            .unwrap();
        store
            .create(NewEntity::new(EntityAttributes::Bin, "B2").with_id("BIN2").under("D2"))
            .unwrap();
        device(&mut store, "Dev1", "BIN1");
        device(&mut store, "Dev2", "BIN1");
        store
    }

    // ========================================================================
    // Create / update
    // ========================================================================

    #[test]
    fn add_entity_respects_whitelist() {
        let mut store = EntityStore::new();
        let dept = store.add_entity(EntityKind::Department, None).unwrap();
        let bin = store.add_entity(EntityKind::Bin, Some(&dept)).unwrap();
        store.add_entity(EntityKind::Device, Some(&bin)).unwrap();

        let err = store.add_entity(EntityKind::Bin, None).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        let err = store.add_entity(EntityKind::Workstation, Some(&bin)).unwrap_err();
        assert!(err.to_string().contains("Workstation under Bin"));
        assert_eq!(store.len(), 3);
        store.check_integrity().unwrap();
    }

    #[test]
    fn add_under_missing_parent_is_not_found() {
        let mut store = EntityStore::new();
        let err = store.add_entity(EntityKind::Bin, Some("nope")).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn duplicate_id_conflicts() {
        let mut store = warehouse();
        let err = store
            .create(NewEntity::new(EntityAttributes::Bin, "again").with_id("BIN1").under("D1"))
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[test]
    fn update_checks_kind_before_writing() {
        let mut store = warehouse();
        let patch = EntityPatch {
            label: Some("Renamed".into()),
            rules: Some(DepartmentRules::default()),
            ..Default::default()
        };
        let err = store.update_entity("BIN1", patch).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(store.get("BIN1").unwrap().label, "B1");

        store
            .update_entity(
                "Dev1",
                EntityPatch::device(DevicePatch {
                    imei: Some("123".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(store.get("Dev1").unwrap().device().unwrap().imei(), Some("123"));

        let mut rules = DepartmentRules::default();
        rules.set(crate::model::RuleKey::Tested, RuleCondition::MustHave);
        store.update_entity("D1", EntityPatch::rules(rules)).unwrap();
        assert_eq!(store.get("D1").unwrap().rules().unwrap().tested, RuleCondition::MustHave);
    }

    #[test]
    fn barcode_and_imei_lookup() {
        let mut store = warehouse();
        store
            .update_entity(
                "BIN1",
                EntityPatch {
                    barcode: Some(Some("BIN-0001".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .update_entity(
                "Dev2",
                EntityPatch::device(DevicePatch {
                    imei: Some("356938035643809".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(store.find_by_barcode(" BIN-0001 ").unwrap().id, "BIN1");
        assert!(store.find_by_barcode("").is_none());
        assert_eq!(store.find_device_by_imei("356938035643809").unwrap().id, "Dev2");
    }

    // ========================================================================
    // Delete
    // ========================================================================

    #[test]
    fn delete_removes_subtree() {
        let mut store = warehouse();
        let removed = store.delete_entity("BIN1").unwrap();
        assert_eq!(removed, 3);
        assert!(!store.contains("Dev1"));
        assert!(store.get("D1").unwrap().children.is_empty());
        store.check_integrity().unwrap();
    }

    #[test]
    fn delete_nested_ids_together() {
        let mut store = warehouse();
        let removed = store
            .delete_entities(&["BIN1".into(), "Dev1".into()])
            .unwrap();
        assert_eq!(removed, 3);
        store.check_integrity().unwrap();
    }

    #[test]
    fn delete_with_unknown_id_changes_nothing() {
        let mut store = warehouse();
        let err = store
            .delete_entities(&["Dev1".into(), "ghost".into()])
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(store.contains("Dev1"));
    }

    // ========================================================================
    // Move
    // ========================================================================

    #[test]
    fn move_entities_reparents() {
        let mut store = warehouse();
        let moved = store
            .move_entities(&["Dev1".into(), "Dev2".into()], "BIN2")
            .unwrap();
        assert_eq!(moved, vec!["Dev1".to_string(), "Dev2".to_string()]);
        assert_eq!(store.get("BIN2").unwrap().children, vec!["Dev1", "Dev2"]);
        assert!(store.get("BIN1").unwrap().children.is_empty());
        store.check_integrity().unwrap();
    }

    #[test]
    fn move_onto_current_parent_is_noop() {
        let mut store = warehouse();
        let before = store.get("BIN1").unwrap().children.clone();
        let moved = store.move_entities(&["Dev1".into(), "Dev2".into()], "BIN1").unwrap();
        assert!(moved.is_empty());
        assert_eq!(store.get("BIN1").unwrap().children, before);
    }

    #[test]
    fn move_into_self_or_descendant_is_rejected() {
        let mut store = warehouse();
        let box_id = store
            .box_entities(BoxRequest {
                box_id: Some("BOX1".into()),
                label: "Tote".into(),
                barcode: None,
                parent_id: "BIN1".into(),
                member_ids: vec!["Dev1".into()],
            })
            .unwrap();

        assert!(store.move_entity(&box_id, &box_id).is_err());
        assert!(store.move_entity("BIN1", "Dev1").is_err());
        assert_eq!(store.parent(&box_id).unwrap().id, "BIN1");
        store.check_integrity().unwrap();
    }

    #[test]
    fn batch_move_is_all_or_nothing() {
        let mut store = warehouse();
        // BIN2 cannot go into BIN1, so Dev1 must not move either.
        let err = store
            .move_entities(&["Dev1".into(), "BIN2".into()], "BIN1")
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        let err = store
            .move_entities(&["Dev1".into(), "D2".into()], "BIN2")
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(store.parent("Dev1").unwrap().id, "BIN1");
        store.check_integrity().unwrap();
    }

    #[test]
    fn relocate_then_restore_round_trips() {
        let mut store = warehouse();
        let prior = store
            .relocate(&["Dev2".into(), "Dev1".into()], "BIN2", None)
            .unwrap();
        store.restore(&prior).unwrap();
        assert_eq!(store.get("BIN1").unwrap().children, vec!["Dev1", "Dev2"]);
        assert!(store.get("BIN2").unwrap().children.is_empty());
        store.check_integrity().unwrap();
    }

    // ========================================================================
    // Box / unbox
    // ========================================================================

    #[test]
    fn box_then_unbox_and_delete() {
        let mut store = warehouse();
        let box_id = store
            .box_entities(BoxRequest {
                box_id: None,
                label: "Tote".into(),
                barcode: Some("TOTE-7".into()),
                parent_id: "BIN1".into(),
                member_ids: vec!["Dev1".into(), "Dev2".into()],
            })
            .unwrap();
        assert_eq!(store.get(&box_id).unwrap().children.len(), 2);
        assert_eq!(store.get("BIN1").unwrap().children, vec![box_id.clone()]);

        let moved = store.unbox_entities(&box_id, None, true).unwrap();
        assert_eq!(moved.len(), 2);
        assert!(!store.contains(&box_id));
        assert_eq!(store.get("BIN1").unwrap().children, vec!["Dev1", "Dev2"]);
        store.check_integrity().unwrap();
    }

    #[test]
    fn unbox_keep_box_leaves_it_empty() {
        let mut store = warehouse();
        let box_id = store
            .box_entities(BoxRequest {
                box_id: Some("BOX1".into()),
                label: "Tote".into(),
                barcode: None,
                parent_id: "BIN1".into(),
                member_ids: vec!["Dev1".into()],
            })
            .unwrap();
        store.unbox_entities(&box_id, Some("BIN2"), false).unwrap();
        assert!(store.get("BOX1").unwrap().children.is_empty());
        assert_eq!(store.parent("Dev1").unwrap().id, "BIN2");
        store.check_integrity().unwrap();
    }

    #[test]
    fn unbox_rejects_non_box() {
        let mut store = warehouse();
        let err = store.unbox_entities("BIN1", None, false).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn box_rejects_containers_as_members() {
        let mut store = warehouse();
        let err = store
            .box_entities(BoxRequest {
                box_id: None,
                label: "Tote".into(),
                barcode: None,
                parent_id: "D1".into(),
                member_ids: vec!["BIN1".into()],
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(store.len(), 6);
    }

    // ========================================================================
    // History
    // ========================================================================

    #[test]
    fn history_receives_structural_changes() {
        let mut store = warehouse();
        let log: Arc<Mutex<Vec<HistoryRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = store.subscribe_history(move |r| sink.lock().unwrap().push(r.clone()));

        store.move_entity("Dev1", "BIN2").unwrap();
        store.delete_entity("Dev2").unwrap();
        {
            let log = log.lock().unwrap();
            assert_eq!(log.len(), 2);
            assert_eq!(log[0].action_type, HistoryAction::Move);
            assert_eq!(log[0].entity_id, "Dev1");
            assert_eq!(log[1].action_type, HistoryAction::Delete);
        }

        store.unsubscribe_history(sub);
        store.move_entity("Dev1", "BIN1").unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn history_covers_create_update_box_and_unbox() {
        let mut store = warehouse();
        let log: Arc<Mutex<Vec<HistoryRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        store.subscribe_history(move |r| sink.lock().unwrap().push(r.clone()));

        let bin = store.add_entity(EntityKind::Bin, Some("D2")).unwrap();
        store
            .update_entity(
                &bin,
                EntityPatch {
                    label: Some("Overflow".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .box_entities(BoxRequest {
                box_id: Some("BOX1".into()),
                label: "Tote".into(),
                barcode: None,
                parent_id: "BIN1".into(),
                member_ids: vec!["Dev1".into(), "Dev2".into()],
            })
            .unwrap();
        store.unbox_entities("BOX1", Some(&bin), true).unwrap();

        let trail: Vec<(HistoryAction, String)> = log
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.action_type, r.entity_id.clone()))
            .collect();
        assert_eq!(
            trail,
            vec![
                (HistoryAction::Create, bin.clone()),
                (HistoryAction::Update, bin.clone()),
                (HistoryAction::Create, "BOX1".to_string()),
                (HistoryAction::Move, "Dev1".to_string()),
                (HistoryAction::Move, "Dev2".to_string()),
                (HistoryAction::Box, "BOX1".to_string()),
                (HistoryAction::Move, "Dev1".to_string()),
                (HistoryAction::Move, "Dev2".to_string()),
                (HistoryAction::Unbox, "BOX1".to_string()),
                (HistoryAction::Delete, "BOX1".to_string()),
            ]
        );
        assert!(log.lock().unwrap().iter().all(|r| !r.timestamp.is_empty()));
    }
}
