//! Handler context.

use super::error::SimError;
use super::event::{EventHandle, Payload};
use super::id::{NodeId, RequestId, ResourceId};
use super::kernel::Kernel;
use super::time::SimTime;
use crate::resource::Request;
use std::any::Any;
use std::ops::{Deref, DerefMut};

/// What a handler sees while it runs: the whole kernel of its tree, plus the
/// local state of the node the event was addressed to.
pub struct Ctx<'a> {
    pub(crate) kernel: &'a mut Kernel,
    pub(crate) node: NodeId,
    pub(crate) state: &'a mut Option<Box<dyn Any>>,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(
        kernel: &'a mut Kernel,
        node: NodeId,
        state: &'a mut Option<Box<dyn Any>>,
    ) -> Self {
        Self {
            kernel,
            node,
            state,
        }
    }

    /// Node the current event targets.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Local state of the current node, if it has state of type `T`.
    pub fn state<T: Any>(&mut self) -> Option<&mut T> {
        self.state.as_mut()?.downcast_mut::<T>()
    }

    pub fn set_state<T: Any>(&mut self, value: T) {
        *self.state = Some(Box::new(value));
    }

    /// Schedule an event for the current node `delay` from now.
    pub fn schedule_in(
        &mut self,
        delay: f64,
        kind: &'static str,
        payload: Payload,
    ) -> Result<EventHandle, SimError> {
        let node = self.node;
        self.kernel.schedule_after(node, delay, kind, payload)
    }

    /// Schedule an event for the current node at an absolute time.
    pub fn schedule_at(
        &mut self,
        at: SimTime,
        priority: i32,
        kind: &'static str,
        payload: Payload,
    ) -> Result<EventHandle, SimError> {
        let node = self.node;
        self.kernel.schedule(node, at, priority, kind, payload)
    }

    /// Like [`Kernel::request`], but follow-ups come back to the current node
    /// unless the request names another one.
    pub fn request(&mut self, rid: ResourceId, mut req: Request) -> Result<RequestId, SimError> {
        req.notify.get_or_insert(self.node);
        self.kernel.request(rid, req)
    }
}

impl Deref for Ctx<'_> {
    type Target = Kernel;

    fn deref(&self) -> &Kernel {
        self.kernel
    }
}

impl DerefMut for Ctx<'_> {
    fn deref_mut(&mut self) -> &mut Kernel {
        self.kernel
    }
}
