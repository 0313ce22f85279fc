use std::collections::BTreeMap;

use truth_proto::{EntityId, Truth};

#[derive(Debug, Clone)]
struct Entry {
    truth: Truth,
    last_seen: u64,
}

/// Latest known truth per entity. Keys are ordered, so iteration and
/// nearest-entity ties resolve by ascending id.
///
/// Only the dispatcher mutates the store; everything else gets `&TruthStore`.
#[derive(Debug, Clone, Default)]
pub struct TruthStore {
    entries: BTreeMap<EntityId, Entry>,
}

impl TruthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Truth> {
        self.entries.get(&id).map(|entry| &entry.truth)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Truth)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, &entry.truth))
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }

    /// Tick at which `id` was last written.
    pub fn last_seen(&self, id: EntityId) -> Option<u64> {
        self.entries.get(&id).map(|entry| entry.last_seen)
    }

    /// Top-level entity closest to `(x, y)`. Equal distances go to the lowest
    /// id.
    pub fn nearest(&self, x: f64, y: f64) -> Option<EntityId> {
        let mut best: Option<(EntityId, f64)> = None;
        for (id, entry) in &self.entries {
            if !entry.truth.is_top_level() {
                continue;
            }
            let dist = entry.truth.pose.distance_to(x, y);
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((*id, dist)),
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn nearest_truth(&self, x: f64, y: f64) -> Option<&Truth> {
        self.nearest(x, y).and_then(|id| self.get(id))
    }

    /// One line per entity, in id order.
    pub fn device_list(&self) -> Vec<String> {
        self.entries
            .values()
            .enumerate()
            .map(|(row, entry)| format!("{:4}: {}", row, entry.truth))
            .collect()
    }

    /// Like [`device_list`](Self::device_list), with every field labelled,
    /// color channels spelled out and the tick each entity was last written.
    pub fn device_list_verbose(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(row, (id, entry))| {
                let truth = &entry.truth;
                format!(
                    "{:4}: key: {} stage type: {} host: {} player: ({:4},{},{}) \
                     parent: ({:4},{},{}) pose: [{:.2},{:.2},{:.2}] size: [{:.2},{:.2}] \
                     color: [{},{},{}] last seen: {}",
                    row,
                    id,
                    truth.stage_type,
                    truth.hostname,
                    truth.id.port,
                    truth.id.device_kind().label(),
                    truth.id.index,
                    truth.parent.port,
                    truth.parent.device_kind().label(),
                    truth.parent.index,
                    truth.pose.x,
                    truth.pose.y,
                    truth.pose.th,
                    truth.width,
                    truth.height,
                    truth.color.red,
                    truth.color.green,
                    truth.color.blue,
                    entry.last_seen,
                )
            })
            .collect()
    }

    /// Insert or overwrite, returning the previous value.
    pub(crate) fn upsert(&mut self, truth: Truth, tick: u64) -> Option<Truth> {
        self.entries
            .insert(
                truth.stage_id,
                Entry {
                    truth,
                    last_seen: tick,
                },
            )
            .map(|entry| entry.truth)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Truth> {
        self.entries.remove(&id).map(|entry| entry.truth)
    }

    /// Ids not written since `cutoff` (exclusive).
    pub(crate) fn seen_before(&self, cutoff: u64) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.last_seen < cutoff)
            .map(|(id, _)| *id)
            .collect()
    }
}
