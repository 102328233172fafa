//! Dirty propagation.

use std::collections::{HashSet, VecDeque};

use log::debug;
use uuid::Uuid;

use super::Graph;
use crate::model::Direction;

impl Graph {
    /// Outputs of the owning node that depend on the input plug `input`,
    /// as declared by the node's behaviour. Empty for output plugs.
    pub fn affects(&self, input: Uuid) -> Vec<Uuid> {
        let is_input = self
            .plug(input)
            .map(|p| p.direction() == Direction::In)
            .unwrap_or(false);
        if !is_input {
            return Vec::new();
        }
        let Some(node) = self.node_of(input) else {
            return Vec::new();
        };
        let Some(behavior) = self.behavior(node) else {
            return Vec::new();
        };

        let mut outputs = Vec::new();
        behavior.affects(self, node, input, &mut outputs);
        let mut seen = HashSet::new();
        outputs.retain(|p| seen.insert(*p));
        outputs
    }

    /// Dirty `plug` and everything downstream of it.
    pub fn propagate_dirtiness(&mut self, plug: Uuid) -> Vec<Uuid> {
        self.propagate_dirtiness_from(&[plug])
    }

    /// Dirty every plug reachable from `seeds` through connections, compound
    /// parents and declared `affects` edges. Each plug is visited once, so
    /// cycles terminate. Cached hashes of the dirtied plugs are dropped before
    /// this returns.
    pub fn propagate_dirtiness_from(&mut self, seeds: &[Uuid]) -> Vec<Uuid> {
        let mut visited = HashSet::new();
        let mut dirtied = Vec::new();
        let mut queue: VecDeque<Uuid> = seeds.iter().copied().collect();
        while let Some(plug) = queue.pop_front() {
            if !self.is_plug(plug) || !visited.insert(plug) {
                continue;
            }
            dirtied.push(plug);
            queue.extend(self.dependents(plug));
        }

        for plug in &dirtied {
            if let Ok(data) = self.plug_mut(*plug) {
                data.dirty_count += 1;
            }
        }
        self.cache.invalidate_plugs(&visited);
        if !dirtied.is_empty() {
            debug!("Dirtied {} plugs from {} seeds", dirtied.len(), seeds.len());
        }
        dirtied
    }
}
