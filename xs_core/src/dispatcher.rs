use tracing::{debug, info};
use truth_proto::{decode_truth, Truth, TruthRecord};

use crate::queue::TruthQueue;
use crate::render::Renderer;
use crate::store::TruthStore;

/// Counts for one dispatcher tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub applied: usize,
    pub created: usize,
    pub echoes: usize,
    pub pruned: usize,
}

/// Applies inbound records to the truth store once per main-loop tick.
#[derive(Debug, Default)]
pub struct Dispatcher {
    tick: u64,
    stale_after: Option<u64>,
}

impl Dispatcher {
    /// `stale_after` opts into removing entities that have not been updated
    /// for that many ticks. `None` keeps every entity forever.
    pub fn new(stale_after: Option<u64>) -> Self {
        Self {
            tick: 0,
            stale_after,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Drain the inbound queue and apply every record in arrival order.
    pub fn tick<R: Renderer + ?Sized>(
        &mut self,
        store: &mut TruthStore,
        inbound: &TruthQueue,
        renderer: &mut R,
    ) -> DispatchReport {
        self.tick += 1;
        let mut report = DispatchReport::default();
        for record in inbound.drain_all() {
            self.apply(store, &record, renderer, &mut report);
        }
        if let Some(stale_after) = self.stale_after {
            report.pruned = self.prune(store, stale_after, renderer);
        }
        report
    }

    /// Retract the old value, store the new one, draw it. The pair for one id
    /// completes before the next record is touched.
    fn apply<R: Renderer + ?Sized>(
        &self,
        store: &mut TruthStore,
        record: &TruthRecord,
        renderer: &mut R,
        report: &mut DispatchReport,
    ) {
        if record.echo_request {
            report.echoes += 1;
            debug!(
                target: "xs::truth",
                id = record.stage_id,
                "truth.inbound.echo_request_set"
            );
        }

        let truth = decode_truth(record);
        let id = truth.stage_id;
        let previous = store
            .get(id)
            .cloned()
            .unwrap_or_else(|| Truth::placeholder(id));
        if !store.contains(id) {
            report.created += 1;
        }

        renderer.retract(&previous);
        store.upsert(truth, self.tick);
        if let Some(current) = store.get(id) {
            renderer.draw(current);
        }
        report.applied += 1;
    }

    fn prune<R: Renderer + ?Sized>(
        &self,
        store: &mut TruthStore,
        stale_after: u64,
        renderer: &mut R,
    ) -> usize {
        let Some(cutoff) = self.tick.checked_sub(stale_after) else {
            return 0;
        };
        let stale = store.seen_before(cutoff);
        for id in &stale {
            if let Some(truth) = store.remove(*id) {
                renderer.retract(&truth);
                info!(
                    target: "xs::truth",
                    %id,
                    stale_after,
                    "truth.store.pruned_stale"
                );
            }
        }
        stale.len()
    }

    /// Log the store contents, one entity per line.
    pub fn log_device_list(&self, store: &TruthStore) {
        info!(
            target: "xs::truth",
            devices = store.len(),
            tick = self.tick,
            "truth.store.device_list"
        );
        for line in store.device_list() {
            info!(target: "xs::truth", "{}", line);
        }
    }

    pub fn log_device_list_verbose(&self, store: &TruthStore) {
        info!(
            target: "xs::truth",
            devices = store.len(),
            tick = self.tick,
            "truth.store.device_list_verbose"
        );
        for line in store.device_list_verbose() {
            info!(target: "xs::truth", "{}", line);
        }
    }
}
