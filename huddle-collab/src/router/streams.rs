use std::sync::Arc;

use chrono::Utc;
use huddle_core::{NewSession, RegistryError, Removal, Stream, StreamMedia, StreamSession};
use log::info;

use crate::{
    Action, Collab, CollabError, CollabResult, ConnectionContext, EndReason, ServerEvent,
    Signal, StartStream, StreamMessage, StreamView, UpdateStreamMedia,
};

use super::member_of;

impl Collab {
    /// Public streams that are currently live, newest first
    pub fn active_streams(&self) -> Vec<StreamView> {
        let mut streams: Vec<_> = self
            .streams
            .list_all()
            .into_iter()
            .filter(|s| s.kind.is_public)
            .collect();

        streams.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        streams.iter().map(|s| s.as_ref().into()).collect()
    }

    pub(super) fn send_active_streams(&self, connection: &ConnectionContext) -> CollabResult<()> {
        self.connections
            .send(connection.id, ServerEvent::ActiveStreams(self.active_streams()));

        Ok(())
    }

    pub(super) fn start_stream(
        &self,
        connection: &ConnectionContext,
        start: StartStream,
    ) -> CollabResult<()> {
        let identity = &connection.identity;

        self.authorize(identity, Action::StartStream, identity.subscription.as_deref())?;

        // Cheap check first, so a taken id does not cost the user their cooldown
        if self.streams.contains(&start.stream_id) {
            return Err(RegistryError::RoomTaken {
                kind: "stream",
                room_id: start.stream_id,
            }
            .into());
        }

        let ticket = self.admission.admit(&identity.user_id)?;

        let created = self.streams.create(NewSession {
            room_id: start.stream_id,
            subscription: None,
            host: member_of(identity),
            kind: Stream {
                title: start.title,
                description: start.description,
                is_public: start.is_public,
                chat_enabled: start.chat_enabled,
                media: StreamMedia::default(),
                max_viewers: self.config.max_viewers_per_stream,
            },
        });

        let stream = match created {
            Ok(stream) => stream,
            Err(error) => {
                self.admission.cancel(ticket);
                return Err(error.into());
            }
        };

        info!(
            "{} started stream {} ({})",
            identity.display_name, stream.room_id, stream.kind.title
        );

        let view = StreamView::from(stream.as_ref());

        self.connections
            .send(connection.id, ServerEvent::StreamStarted(view.clone()));

        if stream.kind.is_public {
            self.connections
                .broadcast(ServerEvent::NewStreamAvailable(view));
        }

        Ok(())
    }

    pub(super) fn join_stream(
        &self,
        connection: &ConnectionContext,
        stream_id: &str,
    ) -> CollabResult<()> {
        let identity = &connection.identity;
        let (stream, is_new) = self.streams.join(stream_id, member_of(identity))?;

        self.connections.send(
            connection.id,
            ServerEvent::StreamJoined(stream.as_ref().into()),
        );

        if !is_new {
            return Ok(());
        }

        self.connections.send_to_users(
            stream.members().into_iter().map(|m| m.user_id.as_str()),
            Some(&identity.user_id),
            ServerEvent::ViewerJoined {
                stream_id: stream.room_id.clone(),
                user_id: identity.user_id.clone(),
                name: identity.display_name.clone(),
                viewer_count: stream.viewer_count(),
            },
        );

        Ok(())
    }

    pub(super) fn leave_stream(
        &self,
        connection: &ConnectionContext,
        stream_id: &str,
    ) -> CollabResult<()> {
        let user_id = connection.user_id();

        match self.streams.remove_member(stream_id, user_id) {
            Removal::Absent => Err(RegistryError::NotMember {
                room_id: stream_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into()),
            removal => {
                self.announce_stream_departure(user_id, removal, false);
                Ok(())
            }
        }
    }

    /// Tells the room about someone leaving, or about the stream ending because of it
    pub(super) fn announce_stream_departure(
        &self,
        user_id: &str,
        removal: Removal<Stream>,
        disconnected: bool,
    ) {
        match removal {
            Removal::Absent => {}
            Removal::Left(stream) => {
                let recipients = stream
                    .member_ids()
                    .into_iter()
                    .chain(std::iter::once(user_id.to_string()))
                    .collect::<Vec<_>>();

                self.connections.send_to_users(
                    recipients.iter().map(String::as_str),
                    None,
                    ServerEvent::ViewerLeft {
                        stream_id: stream.room_id.clone(),
                        user_id: user_id.to_string(),
                        viewer_count: stream.viewer_count(),
                    },
                );
            }
            Removal::Ended(stream, cause) => {
                self.stream_ended(stream, EndReason::from_cause(cause, disconnected))
            }
        }
    }

    /// Notifies everyone who was in an ended stream, and frees the host's hosting slot
    pub(super) fn stream_ended(&self, stream: Arc<StreamSession>, reason: EndReason) {
        self.admission.release(&stream.host);

        info!("Stream {} ended ({:?})", stream.room_id, reason);

        let recipients = stream.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::StreamEnded {
                stream_id: stream.room_id.clone(),
                reason,
            },
        );
    }

    pub(super) fn end_stream(
        &self,
        connection: &ConnectionContext,
        stream_id: &str,
    ) -> CollabResult<()> {
        let user_id = connection.user_id();
        let ended = self.streams.end_if(stream_id, |s| s.is_host(user_id))?;

        self.stream_ended(ended, EndReason::HostEnded);

        Ok(())
    }

    pub(super) fn update_stream_media(
        &self,
        connection: &ConnectionContext,
        update: UpdateStreamMedia,
    ) -> CollabResult<()> {
        let stream = self
            .streams
            .update_media(&update.stream_id, connection.user_id(), update.media)?;
        let recipients = stream.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::StreamMediaUpdated {
                stream_id: stream.room_id.clone(),
                media: stream.kind.media,
            },
        );

        Ok(())
    }

    pub(super) fn stream_message(
        &self,
        connection: &ConnectionContext,
        message: StreamMessage,
    ) -> CollabResult<()> {
        let identity = &connection.identity;
        let text = message.message.trim();

        if text.is_empty() {
            return Err(CollabError::Validation("message is required".to_string()));
        }

        if text.chars().count() > self.config.max_message_length {
            return Err(CollabError::Validation(format!(
                "message must be at most {} characters",
                self.config.max_message_length
            )));
        }

        let stream = self.streams.get(&message.stream_id)?;

        if !stream.kind.chat_enabled && !stream.is_host(&identity.user_id) {
            return Err(CollabError::Forbidden(
                "Chat is disabled for this stream".to_string(),
            ));
        }

        // The sender always gets their own message back, even when not in the room
        let mut recipients = stream.member_ids();
        recipients.push(identity.user_id.clone());

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::StreamMessageReceived {
                stream_id: stream.room_id.clone(),
                user_id: identity.user_id.clone(),
                user_name: identity.display_name.clone(),
                message: text.to_string(),
                timestamp: Utc::now(),
            },
        );

        Ok(())
    }

    pub(super) fn stream_signal(
        &self,
        connection: &ConnectionContext,
        signal: Signal,
    ) -> CollabResult<()> {
        let user_id = connection.user_id();

        let event = ServerEvent::StreamSignal {
            stream_id: signal.room_id.clone(),
            from_user_id: user_id.to_string(),
            signal: signal.signal,
        };

        // Direct signals only need a reachable target, peers may negotiate before joining
        if let Some(target) = &signal.target_user_id {
            return self.relay_to_user(target, event);
        }

        let stream = self.streams.get(&signal.room_id)?;

        if !stream.is_member(user_id) {
            return Err(RegistryError::NotMember {
                room_id: stream.room_id.clone(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let recipients = stream.member_ids();

        self.connections
            .send_to_users(recipients.iter().map(String::as_str), Some(user_id), event);

        Ok(())
    }

    /// Sends a peer-to-peer event through the target user's personal channel
    pub(super) fn relay_to_user(&self, target: &str, event: ServerEvent) -> CollabResult<()> {
        match self.connections.send_to_user(target, event) {
            0 => Err(CollabError::NotFound(format!("User {target} is not connected"))),
            _ => Ok(()),
        }
    }
}
