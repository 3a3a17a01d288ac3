/// StateTracker - current state of every texture touched by one command stream
///
/// A texture enters the tracker with the state committed by the previous
/// frame. `transition` emits exactly one synchronization command per real
/// state change, shaped for the device's sync model, and nothing when the
/// texture is already in the requested state. Commands are never reordered.

use rustc_hash::FxHashMap;

use crate::gpu::{Barrier, Command, ResourceState, SyncModel, TextureAspect, TextureTarget};

pub struct StateTracker {
    sync_model: SyncModel,
    states: FxHashMap<TextureTarget, ResourceState>,
    /// Insertion order of `states`, for deterministic commits
    order: Vec<TextureTarget>,
    emitted: u32,
}

impl StateTracker {
    pub fn new(sync_model: SyncModel) -> Self {
        Self {
            sync_model,
            states: FxHashMap::default(),
            order: Vec::new(),
            emitted: 0,
        }
    }

    pub fn sync_model(&self) -> SyncModel {
        self.sync_model
    }

    /// State of `target` at the current end of the stream
    ///
    /// `committed` is used when the stream has not touched the target yet.
    pub fn state(&self, target: TextureTarget, committed: ResourceState) -> ResourceState {
        self.states.get(&target).copied().unwrap_or(committed)
    }

    /// Move `target` to `to`
    ///
    /// Returns the synchronization command to append, or None when the
    /// target already is in `to`.
    pub fn transition(
        &mut self,
        target: TextureTarget,
        committed: ResourceState,
        to: ResourceState,
        aspect: TextureAspect,
    ) -> Option<Command> {
        let from = self.state(target, committed);
        if from == to {
            return None;
        }
        if self.states.insert(target, to).is_none() {
            self.order.push(target);
        }
        self.emitted += 1;
        Some(match self.sync_model {
            SyncModel::ExplicitBarriers => Command::Barrier(Barrier { target, from, to, aspect }),
            SyncModel::ImplicitTracking => Command::DeclareUsage { target, state: to, aspect },
        })
    }

    /// Final state of every target the stream touched, in first-touch order
    pub fn final_states(&self) -> impl Iterator<Item = (TextureTarget, ResourceState)> + '_ {
        self.order.iter().filter_map(|t| self.states.get(t).map(|s| (*t, *s)))
    }

    /// Number of synchronization commands emitted so far
    pub fn emitted_count(&self) -> u32 {
        self.emitted
    }
}

#[cfg(test)]
#[path = "state_tracker_tests.rs"]
mod tests;
