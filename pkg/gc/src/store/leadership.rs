use tokio::sync::watch;

use crate::collaborators::LeadershipSource;

/// Leadership as reported by a running `LeaderElection`.
pub struct ElectionLeadership {
    rx: watch::Receiver<bool>,
}

impl ElectionLeadership {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }
}

impl LeadershipSource for ElectionLeadership {
    fn is_leader(&self) -> bool {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

/// Fixed leadership, for single-replica deployments with election disabled.
pub struct StaticLeadership {
    tx: watch::Sender<bool>,
}

impl StaticLeadership {
    pub fn new(leader: bool) -> Self {
        Self {
            tx: watch::Sender::new(leader),
        }
    }
}

impl LeadershipSource for StaticLeadership {
    fn is_leader(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
