use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{util::ceil_secs, Config, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// The user started a stream too recently
    #[error("Please wait {remaining_secs} seconds before starting another stream")]
    Cooldown { remaining_secs: u64 },
    /// The user already hosts as many streams as allowed
    #[error("You can only host {limit} stream(s) at a time")]
    StreamLimit { limit: usize },
    /// The server hosts as many streams as allowed
    #[error("The server is at its limit of {limit} live streams, try again later")]
    ServerBusy { limit: usize },
}

/// Proof that a stream start was admitted.
///
/// If the stream then fails to open, hand the ticket back through
/// [Admission::cancel] to undo the admission.
#[derive(Debug)]
#[must_use = "cancel the ticket if the stream is not opened"]
pub struct AdmissionTicket {
    user_id: UserId,
    previous_start: Option<Instant>,
}

impl AdmissionTicket {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Decides whether a user may start hosting a stream right now.
///
/// Keeps its own lock, apart from the registries, since it reasons about
/// attempts over time rather than about the sessions that currently exist.
#[derive(Debug)]
pub struct Admission {
    cooldown: Duration,
    per_user_limit: usize,
    global_limit: usize,
    state: Mutex<AdmissionState>,
}

#[derive(Debug, Default)]
struct AdmissionState {
    hosts: HashMap<UserId, HostRecord>,
    active_total: usize,
}

#[derive(Debug, Default)]
struct HostRecord {
    last_start: Option<Instant>,
    active: usize,
}

impl Admission {
    pub fn new(config: &Config) -> Self {
        Self {
            cooldown: config.stream_cooldown,
            per_user_limit: config.max_streams_per_user,
            global_limit: config.max_active_streams,
            state: Default::default(),
        }
    }

    /// Admits a stream start for the user, recording it if it passes
    pub fn admit(&self, user_id: &str) -> Result<AdmissionTicket, AdmissionError> {
        self.admit_at(user_id, Instant::now())
    }

    pub fn admit_at(&self, user_id: &str, now: Instant) -> Result<AdmissionTicket, AdmissionError> {
        let mut state = self.state.lock();
        let active_total = state.active_total;

        let host = state.hosts.entry(user_id.to_string()).or_default();

        if let Some(last_start) = host.last_start {
            let elapsed = now.saturating_duration_since(last_start);

            if elapsed < self.cooldown {
                let remaining_secs = ceil_secs(self.cooldown - elapsed).max(1);
                debug!("Stream start by {} refused, {}s of cooldown left", user_id, remaining_secs);

                return Err(AdmissionError::Cooldown { remaining_secs });
            }
        }

        if host.active >= self.per_user_limit {
            return Err(AdmissionError::StreamLimit {
                limit: self.per_user_limit,
            });
        }

        if active_total >= self.global_limit {
            return Err(AdmissionError::ServerBusy {
                limit: self.global_limit,
            });
        }

        let previous_start = host.last_start.replace(now);
        host.active += 1;
        state.active_total += 1;

        Ok(AdmissionTicket {
            user_id: user_id.to_string(),
            previous_start,
        })
    }

    /// Undoes an admission whose stream never opened, restoring the previous cooldown
    pub fn cancel(&self, ticket: AdmissionTicket) {
        let mut state = self.state.lock();

        let Some(host) = state.hosts.get_mut(&ticket.user_id) else {
            return;
        };

        if host.active == 0 {
            return;
        }

        host.active -= 1;
        host.last_start = ticket.previous_start;
        state.active_total = state.active_total.saturating_sub(1);
    }

    /// Called whenever a stream hosted by the user ends, however it ended
    pub fn release(&self, user_id: &str) {
        let mut state = self.state.lock();
        let cooldown = self.cooldown;

        let Some(host) = state.hosts.get_mut(user_id) else {
            return;
        };

        if host.active == 0 {
            return;
        }

        host.active -= 1;

        let forgettable = host.active == 0
            && host
                .last_start
                .map_or(true, |started| started.elapsed() >= cooldown);

        if forgettable {
            state.hosts.remove(user_id);
        }

        state.active_total = state.active_total.saturating_sub(1);
    }

    /// How many streams the user currently hosts
    pub fn active_for(&self, user_id: &str) -> usize {
        self.state
            .lock()
            .hosts
            .get(user_id)
            .map(|h| h.active)
            .unwrap_or_default()
    }

    /// How many streams are live across the server
    pub fn active_total(&self) -> usize {
        self.state.lock().active_total
    }
}
