use log::{debug, info};

use crate::{Collab, ConnectionId, Identity};

impl Collab {
    /// Forgets a closed connection. When it was the user's last one, the user
    /// leaves every stream and meeting they were in, ending those they hosted.
    ///
    /// Calling this again for the same connection does nothing.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some(disconnected) = self.connections.unregister(connection_id) else {
            return;
        };

        let identity = disconnected.identity;

        if !disconnected.was_last {
            debug!(
                "{} closed one connection, {} still open",
                identity.display_name,
                self.connections.connections_of(&identity.user_id)
            );
            return;
        }

        self.leave_everything(&identity);
    }

    /// Takes a user out of every stream and meeting, unless they reconnected in the meantime.
    /// Returns false when the user was back online and nothing was touched.
    pub(super) fn leave_everything(&self, identity: &Identity) -> bool {
        if self.connections.is_online(&identity.user_id) {
            debug!(
                "{} reconnected before cleanup, keeping their sessions",
                identity.display_name
            );
            return false;
        }

        let streams = self.streams.remove_user(&identity.user_id);
        let meetings = self.meetings.remove_user(&identity.user_id);

        info!(
            "{} disconnected, leaving {} stream(s) and {} meeting(s)",
            identity.display_name,
            streams.len(),
            meetings.len()
        );

        for removal in streams {
            self.announce_stream_departure(&identity.user_id, removal, true);
        }

        for removal in meetings {
            self.announce_meeting_departure(&identity.user_id, removal, true);
        }

        true
    }
}
