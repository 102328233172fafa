//! One-shot child-added subscriptions.
//!
//! A node behaviour that needs to see children arrive (the loop waiting for
//! its `in` and `out` plugs) holds a [`ChildAddedSubscription`]. While any
//! subscription on a node is live, [`NodeBehavior::child_added`] is called for
//! every child parented under that node. Handing the subscription back to
//! [`Graph::unsubscribe`] ends delivery.
//!
//! [`NodeBehavior::child_added`]: crate::node::NodeBehavior::child_added

use log::trace;
use uuid::Uuid;

use super::Graph;
use crate::error::GraphError;

/// Proof of an active subscription. Not `Clone`: it can be surrendered once.
#[derive(Debug, PartialEq, Eq)]
pub struct ChildAddedSubscription {
    parent: Uuid,
    id: u64,
}

impl ChildAddedSubscription {
    pub fn parent(&self) -> Uuid {
        self.parent
    }
}

impl Graph {
    pub fn subscribe_child_added(&mut self, parent: Uuid) -> Result<ChildAddedSubscription, GraphError> {
        self.component_ref(parent)?;
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscriptions.entry(parent).or_default().push(id);
        trace!("Subscribed {} to child-added on {}", id, self.full_name(parent));
        Ok(ChildAddedSubscription { parent, id })
    }

    pub fn unsubscribe(&mut self, subscription: ChildAddedSubscription) {
        if let Some(ids) = self.subscriptions.get_mut(&subscription.parent) {
            ids.retain(|id| *id != subscription.id);
            if ids.is_empty() {
                self.subscriptions.remove(&subscription.parent);
            }
        }
    }

    pub fn has_child_added_subscribers(&self, parent: Uuid) -> bool {
        self.subscriptions.get(&parent).is_some_and(|ids| !ids.is_empty())
    }

    /// Deliver a child-added notification to the parent's behaviour. The
    /// behaviour is taken out of the arena for the call so it may mutate the
    /// graph.
    pub(crate) fn notify_child_added(&mut self, parent: Uuid, child: Uuid) -> Result<(), GraphError> {
        if !self.has_child_added_subscribers(parent) {
            return Ok(());
        }
        let Some(mut behavior) = self.behaviors.remove(&parent) else {
            return Ok(());
        };
        let result = behavior.child_added(self, parent, child);
        if self.components.contains_key(&parent) {
            self.behaviors.insert(parent, behavior);
        }
        result
    }
}
