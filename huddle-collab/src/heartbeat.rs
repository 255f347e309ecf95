use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, warn};
use tokio::time::{interval, MissedTickBehavior};

use crate::{Collab, ServerEvent};

/// The result of one heartbeat round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Connections a ping was delivered to
    pub probed: usize,
    /// Connections silent for longer than two intervals
    pub stale: usize,
}

impl Collab {
    /// Pings every connection and reports the ones that went quiet.
    /// Stale connections are only logged, the transport decides when a socket is dead.
    pub fn heartbeat(&self) -> HeartbeatReport {
        let stale = self.connections.stale(self.config.stale_after());

        for (id, user_id) in &stale {
            warn!("Connection {} of {} has not answered in a while", id, user_id);
        }

        let probed = self.connections.broadcast(ServerEvent::Ping {
            timestamp: Utc::now(),
        });

        debug!("Heartbeat sent to {} connection(s)", probed);

        HeartbeatReport {
            probed,
            stale: stale.len(),
        }
    }
}

/// Runs the heartbeat forever at the configured interval
pub async fn run_heartbeat(collab: Arc<Collab>) {
    let period = collab.config.heartbeat_interval.max(Duration::from_secs(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        collab.heartbeat();
    }
}
