mod disconnect;
mod meetings;
mod streams;

use huddle_core::Member;
use log::{debug, warn};

use crate::{ClientEvent, Collab, CollabError, ConnectionContext, ErrorCode, Identity};

impl Collab {
    /// Handles one inbound event from a connection.
    ///
    /// Every expected failure is reported back to the originating connection
    /// as an `error` event, and never ends the connection.
    pub fn handle(&self, connection: &ConnectionContext, event: ClientEvent) {
        self.connections.touch(connection.id);

        if let Err(error) = self.dispatch(connection, event) {
            self.reject(connection, &error);
        }
    }

    /// Handles a raw text frame, reporting malformed ones to the sender
    pub fn handle_text(&self, connection: &ConnectionContext, text: &str) {
        match ClientEvent::decode(text) {
            Ok(event) => self.handle(connection, event),
            Err(error) => {
                self.connections.touch(connection.id);
                self.reject(connection, &error)
            }
        }
    }

    fn reject(&self, connection: &ConnectionContext, error: &CollabError) {
        match error.code() {
            ErrorCode::InternalError => {
                warn!("Event from {} failed: {}", connection.user_id(), error)
            }
            code => debug!(
                "Event from {} rejected with {:?}: {}",
                connection.user_id(),
                code,
                error
            ),
        }

        self.connections.send(connection.id, error.to_event());
    }

    fn dispatch(&self, connection: &ConnectionContext, event: ClientEvent) -> Result<(), CollabError> {
        match event {
            ClientEvent::GetActiveStreams => self.send_active_streams(connection),
            ClientEvent::StartStream(start) => self.start_stream(connection, start),
            ClientEvent::JoinStream(stream_id) => self.join_stream(connection, &stream_id),
            ClientEvent::LeaveStream(stream_id) => self.leave_stream(connection, &stream_id),
            ClientEvent::EndStream(stream_id) => self.end_stream(connection, &stream_id),
            ClientEvent::UpdateStreamMedia(update) => self.update_stream_media(connection, update),
            ClientEvent::StreamMessage(message) => self.stream_message(connection, message),
            ClientEvent::StreamSignal(signal) => self.stream_signal(connection, signal),
            ClientEvent::GetActiveMeetings => self.send_active_meetings(connection),
            ClientEvent::CreateMeeting(create) => self.create_meeting_event(connection, create),
            ClientEvent::JoinMeeting(room_id) => self.join_meeting_event(connection, &room_id),
            ClientEvent::LeaveMeeting(room_id) => {
                self.leave_meeting(&connection.identity, &room_id, None)
            }
            ClientEvent::EndMeeting(room_id) => {
                self.end_meeting(&connection.identity, &room_id, None)
                    .map(|_| ())
            }
            ClientEvent::UpdatePermissions(update) => self
                .update_permissions(&connection.identity, &update.room_id, update.media, None)
                .map(|_| ()),
            ClientEvent::UpdateParticipantMedia(update) => {
                self.update_participant_media(connection, update)
            }
            ClientEvent::MeetingSignal(signal) => self.meeting_signal(connection, signal),
            ClientEvent::Pong => Ok(()),
        }
    }
}

/// Builds the membership record for an identity
fn member_of<M: Default>(identity: &Identity) -> Member<M> {
    Member::new(
        identity.user_id.clone(),
        identity.display_name.clone(),
        identity.email.clone(),
    )
}

#[cfg(test)]
mod test;
