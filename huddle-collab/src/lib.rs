mod auth;
mod connections;
mod directory;
mod error;
mod events;
mod heartbeat;
mod router;
mod util;

pub use auth::*;
pub use connections::*;
pub use directory::*;
pub use error::*;
pub use events::*;
pub use heartbeat::*;

#[cfg(test)]
pub(crate) use util::test_util;

use huddle_core::{Admission, Config, MeetingRegistry, StreamRegistry};
use log::info;

/// The huddle collab system, coordinating live meetings and streams between connected users.
///
/// One instance exists per process. The real-time router and the REST handlers
/// share it, so state is the same regardless of entry point.
pub struct Collab {
    pub config: Config,

    pub meetings: MeetingRegistry,
    pub streams: StreamRegistry,
    pub admission: Admission,
    pub connections: Connections,

    auth: BoxedAuthenticator,
    policy: Box<dyn Policy>,
}

impl Collab {
    pub fn new<A>(config: Config, auth: A) -> Self
    where
        A: Authenticator + 'static,
    {
        Self {
            admission: Admission::new(&config),
            meetings: Default::default(),
            streams: Default::default(),
            connections: Default::default(),
            auth: Box::new(auth),
            policy: Box::new(RolePolicy),
            config,
        }
    }

    /// Replaces the default [RolePolicy]
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: Policy + 'static,
    {
        self.policy = Box::new(policy);
        self
    }

    /// Binds an authenticated identity to a new connection and confirms it to the client
    pub fn connect(&self, identity: Identity) -> (ConnectionContext, EventReceiver) {
        let (context, receiver) = self.connections.register(identity);

        info!(
            "{} connected ({} open connection(s))",
            context.identity.display_name,
            self.connections.connections_of(context.user_id())
        );

        self.connections.send(
            context.id,
            ServerEvent::ConnectionConfirmed {
                connection_id: context.id,
                user_id: context.identity.user_id.clone(),
                display_name: context.identity.display_name.clone(),
            },
        );

        (context, receiver)
    }
}
