use std::sync::Arc;

use huddle_core::{
    AccessType, MediaPermissions, MediaToggle, Meeting, MeetingSession, NewSession, RegistryError,
    Removal,
};
use log::info;

use crate::{
    util::random_string, Action, Collab, CollabError, CollabResult, ConnectionContext,
    CreateMeeting, EndReason, Identity, MeetingView, ServerEvent, Signal, UpdateMedia,
};

use super::member_of;

const ROOM_ID_LENGTH: usize = 10;

impl Collab {
    /// Active meetings of a subscription, as seen by `identity`
    pub fn list_meetings(
        &self,
        identity: &Identity,
        subscription: &str,
    ) -> CollabResult<Vec<MeetingView>> {
        self.authorize(identity, Action::ViewMeetings, Some(subscription))?;

        let mut meetings = self.meetings.list_by_subscription(subscription);
        meetings.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(meetings.iter().map(|m| m.as_ref().into()).collect())
    }

    pub fn get_meeting(
        &self,
        identity: &Identity,
        subscription: &str,
        room_id: &str,
    ) -> CollabResult<MeetingView> {
        self.authorize(identity, Action::ViewMeetings, Some(subscription))?;

        let meeting = self.meeting_in_scope(room_id, Some(subscription))?;
        Ok(meeting.as_ref().into())
    }

    /// Opens a meeting for a subscription, with `identity` as its host
    pub fn create_meeting(
        &self,
        identity: &Identity,
        subscription: &str,
        create: CreateMeeting,
    ) -> CollabResult<Arc<MeetingSession>> {
        create.validate()?;
        self.authorize(identity, Action::CreateMeeting, Some(subscription))?;

        let room_id = create
            .room_id
            .unwrap_or_else(|| random_string(ROOM_ID_LENGTH));

        let title = create
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{}'s meeting", identity.display_name));

        let mut permissions = MediaPermissions::default();
        permissions.apply(create.permissions);

        let meeting = self.meetings.create(NewSession {
            room_id,
            subscription: Some(subscription.to_string()),
            host: member_of(identity),
            kind: Meeting {
                title,
                access: create.access_type,
                group_ids: create.group_ids,
                permissions,
            },
        })?;

        info!(
            "{} created meeting {} for {}",
            identity.display_name, meeting.room_id, subscription
        );

        Ok(meeting)
    }

    /// Adds `identity` to a meeting and tells the others about it
    pub fn join_meeting(
        &self,
        identity: &Identity,
        room_id: &str,
        scope: Option<&str>,
    ) -> CollabResult<Arc<MeetingSession>> {
        let meeting = self.meeting_in_scope(room_id, scope)?;

        self.authorize(identity, Action::JoinMeeting, meeting.subscription.as_deref())?;

        if !Self::may_enter(identity, &meeting) {
            return Err(CollabError::Forbidden(
                "This meeting is limited to specific groups".to_string(),
            ));
        }

        let (meeting, is_new) = self.meetings.join(room_id, member_of(identity))?;

        if !is_new {
            return Ok(meeting);
        }

        let view = MeetingView::from(meeting.as_ref());

        if let Some(participant) = view
            .participants
            .iter()
            .find(|p| p.user_id == identity.user_id)
        {
            let recipients = meeting.member_ids();

            self.connections.send_to_users(
                recipients.iter().map(String::as_str),
                Some(&identity.user_id),
                ServerEvent::ParticipantJoined {
                    room_id: meeting.room_id.clone(),
                    participant: participant.clone(),
                    participant_count: meeting.member_count(),
                },
            );
        }

        Ok(meeting)
    }

    pub fn leave_meeting(
        &self,
        identity: &Identity,
        room_id: &str,
        scope: Option<&str>,
    ) -> CollabResult<()> {
        self.meeting_in_scope(room_id, scope)?;

        match self.meetings.remove_member(room_id, &identity.user_id) {
            Removal::Absent => Err(RegistryError::NotMember {
                room_id: room_id.to_string(),
                user_id: identity.user_id.clone(),
            }
            .into()),
            removal => {
                self.announce_meeting_departure(&identity.user_id, removal, false);
                Ok(())
            }
        }
    }

    /// Ends a meeting for everyone. Only the host or an admin may do this.
    pub fn end_meeting(
        &self,
        identity: &Identity,
        room_id: &str,
        scope: Option<&str>,
    ) -> CollabResult<Arc<MeetingSession>> {
        self.meeting_in_scope(room_id, scope)?;

        let ended = self
            .meetings
            .end_if(room_id, |m| Self::may_manage(identity, m))?;
        self.meeting_ended(ended.clone(), EndReason::HostEnded);

        Ok(ended)
    }

    /// Changes what non-host participants may use and tells the room
    pub fn update_permissions(
        &self,
        identity: &Identity,
        room_id: &str,
        toggle: MediaToggle,
        scope: Option<&str>,
    ) -> CollabResult<Arc<MeetingSession>> {
        let meeting = self.meeting_in_scope(room_id, scope)?;

        self.authorize(identity, Action::UpdatePermissions, meeting.subscription.as_deref())?;

        let meeting = self
            .meetings
            .update_permissions(room_id, toggle, |m| Self::may_manage(identity, m))?;
        let view = MeetingView::from(meeting.as_ref());
        let recipients = meeting.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::PermissionsUpdated {
                room_id: view.room_id,
                permissions: view.permissions,
                participants: view.participants,
            },
        );

        Ok(meeting)
    }

    pub(super) fn send_active_meetings(&self, connection: &ConnectionContext) -> CollabResult<()> {
        let identity = &connection.identity;

        let meetings = match identity.subscription.as_deref() {
            Some(subscription) => self.list_meetings(identity, subscription)?,
            None => vec![],
        };

        self.connections
            .send(connection.id, ServerEvent::ActiveMeetings(meetings));

        Ok(())
    }

    pub(super) fn create_meeting_event(
        &self,
        connection: &ConnectionContext,
        create: CreateMeeting,
    ) -> CollabResult<()> {
        let identity = &connection.identity;

        let subscription = identity.subscription.as_deref().ok_or_else(|| {
            CollabError::Forbidden("You are not part of a subscription".to_string())
        })?;

        let meeting = self.create_meeting(identity, subscription, create)?;

        self.connections
            .send(connection.id, ServerEvent::MeetingCreated(meeting.as_ref().into()));

        Ok(())
    }

    pub(super) fn join_meeting_event(
        &self,
        connection: &ConnectionContext,
        room_id: &str,
    ) -> CollabResult<()> {
        let meeting = self.join_meeting(&connection.identity, room_id, None)?;

        self.connections
            .send(connection.id, ServerEvent::MeetingJoined(meeting.as_ref().into()));

        Ok(())
    }

    pub(super) fn update_participant_media(
        &self,
        connection: &ConnectionContext,
        update: UpdateMedia,
    ) -> CollabResult<()> {
        let user_id = connection.user_id();
        let meeting = self
            .meetings
            .update_participant_media(&update.room_id, user_id, update.media)?;

        let Some(member) = meeting.member(user_id) else {
            return Err(CollabError::Internal(format!(
                "{user_id} vanished from {} while updating media",
                meeting.room_id
            )));
        };

        let recipients = meeting.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::ParticipantMediaUpdated {
                room_id: meeting.room_id.clone(),
                user_id: user_id.to_string(),
                media: member.media,
            },
        );

        Ok(())
    }

    pub(super) fn meeting_signal(
        &self,
        connection: &ConnectionContext,
        signal: Signal,
    ) -> CollabResult<()> {
        let user_id = connection.user_id();

        let event = ServerEvent::MeetingSignal {
            room_id: signal.room_id.clone(),
            from_user_id: user_id.to_string(),
            signal: signal.signal,
        };

        if let Some(target) = &signal.target_user_id {
            return self.relay_to_user(target, event);
        }

        let meeting = self.meetings.get(&signal.room_id)?;

        if !meeting.is_member(user_id) {
            return Err(RegistryError::NotMember {
                room_id: meeting.room_id.clone(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let recipients = meeting.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            Some(user_id),
            event,
        );

        Ok(())
    }

    /// Tells the room about someone leaving, or about the meeting ending because of it
    pub(super) fn announce_meeting_departure(
        &self,
        user_id: &str,
        removal: Removal<Meeting>,
        disconnected: bool,
    ) {
        match removal {
            Removal::Absent => {}
            Removal::Left(meeting) => {
                let recipients = meeting
                    .member_ids()
                    .into_iter()
                    .chain(std::iter::once(user_id.to_string()))
                    .collect::<Vec<_>>();

                self.connections.send_to_users(
                    recipients.iter().map(String::as_str),
                    None,
                    ServerEvent::ParticipantLeft {
                        room_id: meeting.room_id.clone(),
                        user_id: user_id.to_string(),
                        participant_count: meeting.member_count(),
                    },
                );
            }
            Removal::Ended(meeting, cause) => {
                self.meeting_ended(meeting, EndReason::from_cause(cause, disconnected))
            }
        }
    }

    fn meeting_ended(&self, meeting: Arc<MeetingSession>, reason: EndReason) {
        info!("Meeting {} ended ({:?})", meeting.room_id, reason);

        let recipients = meeting.member_ids();

        self.connections.send_to_users(
            recipients.iter().map(String::as_str),
            None,
            ServerEvent::MeetingEnded {
                room_id: meeting.room_id.clone(),
                reason,
            },
        );
    }

    /// Looks up a meeting, hiding it when it belongs to a different subscription than `scope`
    fn meeting_in_scope(
        &self,
        room_id: &str,
        scope: Option<&str>,
    ) -> CollabResult<Arc<MeetingSession>> {
        let meeting = self.meetings.get(room_id)?;

        match scope {
            Some(scope) if meeting.subscription.as_deref() != Some(scope) => {
                Err(RegistryError::NotFound {
                    kind: "meeting",
                    room_id: room_id.to_string(),
                }
                .into())
            }
            _ => Ok(meeting),
        }
    }

    /// Group meetings only let in members of one of their groups
    fn may_enter(identity: &Identity, meeting: &MeetingSession) -> bool {
        match meeting.kind.access {
            AccessType::Public => true,
            AccessType::Group => {
                meeting.is_host(&identity.user_id)
                    || identity.is_admin()
                    || identity
                        .groups
                        .iter()
                        .any(|g| meeting.kind.group_ids.contains(g))
            }
        }
    }

    /// Hosts and admins may end a meeting or change its permissions
    fn may_manage(identity: &Identity, meeting: &MeetingSession) -> bool {
        meeting.is_host(&identity.user_id) || identity.is_admin()
    }

    pub(super) fn authorize(
        &self,
        identity: &Identity,
        action: Action,
        subscription: Option<&str>,
    ) -> CollabResult<()> {
        if self.policy.is_authorized(identity, action, subscription) {
            return Ok(());
        }

        Err(CollabError::Forbidden(format!(
            "You are not allowed to {}",
            action.describe()
        )))
    }
}
