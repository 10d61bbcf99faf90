//! Once-per-frame driver for every navigation world.

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::controller::{PathController, TickReport};

new_key_type! {
    pub struct ControllerId;
}

/// Owns path controllers and ticks the enabled ones in registration order.
#[derive(Default)]
pub struct TickleManager {
    controllers: SlotMap<ControllerId, PathController>,
    order: Vec<ControllerId>,
}

impl TickleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, controller: PathController) -> ControllerId {
        let id = self.controllers.insert(controller);
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: ControllerId) -> Option<PathController> {
        self.order.retain(|&c| c != id);
        self.controllers.remove(id)
    }

    pub fn get(&self, id: ControllerId) -> Option<&PathController> {
        self.controllers.get(id)
    }

    pub fn get_mut(&mut self, id: ControllerId) -> Option<&mut PathController> {
        self.controllers.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ticks every enabled controller to `time`. Disabled controllers are
    /// skipped and produce no report.
    pub fn tickle(&mut self, time: f32) -> Vec<(ControllerId, TickReport)> {
        let mut reports = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            let Some(controller) = self.controllers.get_mut(id) else {
                continue;
            };
            if !controller.is_enabled() {
                continue;
            }
            reports.push((id, controller.tickle(time)));
        }
        debug!(time, ticked = reports.len(), "tickle pass finished");
        reports
    }
}
