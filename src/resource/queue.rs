//! Queue: a named waiting line of entities with no service attached.

use super::wait_queue::{Discipline, WaitQueue};
use super::{PrimitiveKind, ResourceSnapshotParts, Scope};
use crate::sim::{EntityId, NodeId, SimTime};

#[derive(Debug)]
pub struct Queue {
    name: String,
    owner: NodeId,
    line: WaitQueue<EntityId>,
}

impl Queue {
    pub(crate) fn new(name: String, owner: NodeId, discipline: Discipline, capacity: usize) -> Self {
        Self {
            name,
            owner,
            line: WaitQueue::with_capacity(discipline, capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.line.is_full()
    }

    pub fn peek(&self) -> Option<EntityId> {
        self.line.peek().map(|w| w.item)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.line.iter().any(|w| w.item == entity)
    }

    /// Entities in service order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.line.iter().map(|w| w.item)
    }

    /// Returns `false` (and leaves the queue untouched) when full.
    pub(crate) fn enqueue(&mut self, scope: &mut Scope<'_>, entity: EntityId, priority: i32) -> bool {
        let now = scope.now();
        if self.line.push(entity, priority, now).is_err() {
            scope.count(&self.name, "rejections", Some(entity));
            return false;
        }
        scope.count(&self.name, "entries", Some(entity));
        self.report_line(scope);
        true
    }

    pub(crate) fn dequeue(&mut self, scope: &mut Scope<'_>) -> Option<EntityId> {
        let w = self.line.pop()?;
        self.exit(scope, w.item, w.entered);
        Some(w.item)
    }

    pub(crate) fn remove(&mut self, scope: &mut Scope<'_>, entity: EntityId) -> bool {
        match self.line.remove_by(|e| *e == entity) {
            Some(w) => {
                self.exit(scope, w.item, w.entered);
                true
            }
            None => false,
        }
    }

    /// Empty the queue, reporting every exit. Returns the entities in
    /// service order.
    pub(crate) fn clear(&mut self, scope: &mut Scope<'_>) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.line.len());
        while let Some(w) = self.line.pop() {
            self.exit(scope, w.item, w.entered);
            out.push(w.item);
        }
        out
    }

    /// Move `entity` to a new priority class; its entry time is kept.
    pub(crate) fn reprioritize(&mut self, scope: &mut Scope<'_>, entity: EntityId, priority: i32) -> bool {
        if !self.line.reprioritize(|e| *e == entity, priority) {
            return false;
        }
        scope.count(&self.name, "reprioritized", Some(entity));
        true
    }

    fn exit(&self, scope: &mut Scope<'_>, entity: EntityId, entered: SimTime) {
        let wait = scope.now().since(entered);
        scope.observe(&self.name, "wait", wait, Some(entity));
        scope.count(&self.name, "exits", Some(entity));
        self.report_line(scope);
    }

    fn report_line(&self, scope: &mut Scope<'_>) {
        scope.observe(&self.name, "queue_len", self.line.len() as f64, None);
    }

    pub(crate) fn snapshot_parts(&self) -> ResourceSnapshotParts {
        ResourceSnapshotParts {
            kind: PrimitiveKind::Queue,
            owner: self.owner,
            capacity: (self.line.capacity() != 0).then(|| self.line.capacity()),
            busy: 0,
            waiting: self.line.len(),
            holders: Vec::new(),
            waiting_requests: Vec::new(),
            waiting_entities: self.line.iter().map(|w| Some(w.item)).collect(),
        }
    }
}
