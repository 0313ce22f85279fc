use crate::dispatcher::DispatchReport;
use crate::interaction::InteractionOutcome;

/// Running totals for one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionMetrics {
    pub ticks: u64,
    pub applied: u64,
    pub created: u64,
    pub echoes: u64,
    pub pruned: u64,
    pub sent: u64,
    pub dropped: u64,
}

impl SessionMetrics {
    pub fn record_tick(&mut self, report: &DispatchReport) {
        self.ticks += 1;
        self.applied += report.applied as u64;
        self.created += report.created as u64;
        self.echoes += report.echoes as u64;
        self.pruned += report.pruned as u64;
    }

    pub fn record_interaction(&mut self, outcome: &InteractionOutcome) {
        if outcome.sent() {
            self.sent += 1;
        }
        if outcome.dropped() {
            self.dropped += 1;
        }
    }

    /// Fold totals from a previous session, used across reconnects.
    pub fn absorb(&mut self, other: &SessionMetrics) {
        self.ticks += other.ticks;
        self.applied += other.applied;
        self.created += other.created;
        self.echoes += other.echoes;
        self.pruned += other.pruned;
        self.sent += other.sent;
        self.dropped += other.dropped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truth_proto::EntityId;

    #[test]
    fn totals_accumulate() {
        let mut metrics = SessionMetrics::default();
        metrics.record_tick(&DispatchReport {
            applied: 3,
            created: 2,
            echoes: 1,
            pruned: 0,
        });
        metrics.record_tick(&DispatchReport::default());
        metrics.record_interaction(&InteractionOutcome::Started(EntityId(1)));
        metrics.record_interaction(&InteractionOutcome::Sent {
            id: EntityId(1),
            dropped: true,
        });
        metrics.record_interaction(&InteractionOutcome::Stopped {
            id: EntityId(1),
            dropped: false,
        });

        assert_eq!(metrics.ticks, 2);
        assert_eq!(metrics.applied, 3);
        assert_eq!(metrics.created, 2);
        assert_eq!(metrics.echoes, 1);
        assert_eq!(metrics.sent, 2);
        assert_eq!(metrics.dropped, 1);

        let mut total = SessionMetrics::default();
        total.absorb(&metrics);
        total.absorb(&metrics);
        assert_eq!(total.applied, 6);
    }
}
