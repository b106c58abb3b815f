//! Shared model for resource tests: a `client` node that turns `arrive`
//! events into requests and records every grant and completion.

use crate::resource::{Outcome, Request};
use crate::sim::{EntityId, NodeId, Payload, RequestId, ResourceId, SimError, SimTime, Simulation};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(super) struct Job {
    pub entity: u64,
    pub duration: Option<f64>,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Mark {
    pub what: &'static str,
    pub at: f64,
    pub outcome: Outcome,
}

pub(super) struct Client {
    pub node: NodeId,
    pub marks: Arc<Mutex<Vec<Mark>>>,
    pub ids: Arc<Mutex<HashMap<u64, RequestId>>>,
}

impl Client {
    pub fn new(sim: &mut Simulation, rid: ResourceId) -> Client {
        let node = sim.create_child(sim.root(), "client").expect("client");
        let marks = Arc::new(Mutex::new(Vec::new()));
        let ids = Arc::new(Mutex::new(HashMap::new()));

        let ids_in = Arc::clone(&ids);
        sim.on(node, "arrive", move |ctx, mut ev| {
            let job = ev
                .payload
                .take::<Job>()
                .ok_or_else(|| SimError::Handler("arrive without job".into()))?;
            let mut req = Request::new()
                .entity(EntityId(job.entity))
                .priority(job.priority)
                .on_grant("granted")
                .on_done("done");
            req.duration = job.duration;
            let id = ctx.request(rid, req)?;
            ids_in.lock().expect("ids lock").insert(job.entity, id);
            Ok(())
        })
        .expect("handler");

        for what in ["granted", "done"] {
            let marks = Arc::clone(&marks);
            sim.on(node, what, move |ctx, ev| {
                let outcome = ev
                    .payload
                    .get::<Outcome>()
                    .cloned()
                    .ok_or_else(|| SimError::Handler("follow-up without outcome".into()))?;
                marks.lock().expect("marks lock").push(Mark {
                    what,
                    at: ctx.now().0,
                    outcome,
                });
                Ok(())
            })
            .expect("handler");
        }

        sim.on(node, "release", move |ctx, ev| {
            let id = *ev
                .payload
                .get::<RequestId>()
                .ok_or_else(|| SimError::Handler("release without id".into()))?;
            ctx.release(rid, id)?;
            Ok(())
        })
        .expect("handler");

        Client { node, marks, ids }
    }

    pub fn arrive(
        &self,
        sim: &mut Simulation,
        at: f64,
        entity: u64,
        duration: Option<f64>,
        priority: i32,
    ) {
        let job = Job {
            entity,
            duration,
            priority,
        };
        sim.schedule(self.node, SimTime(at), 0, "arrive", Payload::new(job))
            .expect("schedule arrival");
    }

    pub fn id(&self, entity: u64) -> RequestId {
        *self.ids.lock().expect("ids lock").get(&entity).expect("request id")
    }

    /// `(entity, time)` of every mark of one kind, in dispatch order.
    pub fn times(&self, what: &str) -> Vec<(u64, f64)> {
        self.marks
            .lock()
            .expect("marks lock")
            .iter()
            .filter(|m| m.what == what)
            .map(|m| (m.outcome.entity.map_or(u64::MAX, |e| e.0), m.at))
            .collect()
    }

    pub fn outcome(&self, what: &str, entity: u64) -> Outcome {
        self.marks
            .lock()
            .expect("marks lock")
            .iter()
            .find(|m| m.what == what && m.outcome.entity == Some(EntityId(entity)))
            .map(|m| m.outcome.clone())
            .expect("outcome")
    }
}
