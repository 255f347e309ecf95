use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    Meeting, MediaToggle, Member, NewSession, ParticipantMedia, RoomId, Session, SessionKind,
    SessionStatus, Stream, StreamMediaUpdate, SubscriptionId, UserId,
};

pub type MeetingRegistry = Registry<Meeting>;
pub type StreamRegistry = Registry<Stream>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} {room_id} not found")]
    NotFound { kind: &'static str, room_id: RoomId },
    #[error("{kind} {room_id} already exists")]
    RoomTaken { kind: &'static str, room_id: RoomId },
    #[error("Subscription already has an active {kind}")]
    SubscriptionBusy {
        kind: &'static str,
        subscription: SubscriptionId,
    },
    #[error("{room_id} is full ({capacity} viewers)")]
    Full { room_id: RoomId, capacity: usize },
    #[error("User {user_id} is not in {room_id}")]
    NotMember { room_id: RoomId, user_id: UserId },
    #[error("Only the host can {action} this {kind}")]
    NotHost {
        kind: &'static str,
        room_id: RoomId,
        action: &'static str,
    },
    #[error("{medium} is not permitted in {room_id}")]
    NotPermitted {
        room_id: RoomId,
        medium: &'static str,
    },
}

/// Why a session was ended as a side effect of someone leaving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    /// The host left, which always ends the session
    HostLeft,
    /// The last member left
    Empty,
}

/// The outcome of removing a member
#[derive(Debug, Clone)]
pub enum Removal<K: SessionKind> {
    /// The user was not a member, or the room does not exist
    Absent,
    /// The user left and the session carries on
    Left(Arc<Session<K>>),
    /// The user left and the session was torn down
    Ended(Arc<Session<K>>, EndCause),
}

impl<K: SessionKind> Removal<K> {
    pub fn found(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    pub fn ended(&self) -> bool {
        matches!(self, Self::Ended(..))
    }

    pub fn session(&self) -> Option<&Arc<Session<K>>> {
        match self {
            Self::Absent => None,
            Self::Left(session) | Self::Ended(session, _) => Some(session),
        }
    }
}

/// An in-memory store of the active sessions of one kind.
///
/// Everything lives behind a single lock, and every change to a session
/// updates the primary table and both secondary indexes in the same critical
/// section. Reads return [Arc] snapshots that are never mutated after being
/// handed out, since writes go through [Arc::make_mut].
#[derive(Debug)]
pub struct Registry<K: SessionKind> {
    index: RwLock<Index<K>>,
}

#[derive(Debug)]
struct Index<K: SessionKind> {
    sessions: HashMap<RoomId, Arc<Session<K>>>,
    by_subscription: HashMap<SubscriptionId, HashSet<RoomId>>,
    by_user: HashMap<UserId, HashSet<RoomId>>,
}

impl<K: SessionKind> Default for Index<K> {
    fn default() -> Self {
        Self {
            sessions: Default::default(),
            by_subscription: Default::default(),
            by_user: Default::default(),
        }
    }
}

impl<K: SessionKind> Index<K> {
    fn not_found(room_id: &str) -> RegistryError {
        RegistryError::NotFound {
            kind: K::NAME,
            room_id: room_id.to_string(),
        }
    }

    fn session_mut(&mut self, room_id: &str) -> Result<&mut Session<K>, RegistryError> {
        self.sessions
            .get_mut(room_id)
            .map(Arc::make_mut)
            .ok_or_else(|| Self::not_found(room_id))
    }

    /// Fails with [RegistryError::NotHost] unless `allowed` accepts the session
    fn guard<F>(
        &self,
        room_id: &str,
        action: &'static str,
        allowed: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(&Session<K>) -> bool,
    {
        let session = self
            .sessions
            .get(room_id)
            .ok_or_else(|| Self::not_found(room_id))?;

        if allowed(session) {
            Ok(())
        } else {
            Err(RegistryError::NotHost {
                kind: K::NAME,
                room_id: room_id.to_string(),
                action,
            })
        }
    }

    fn link(&mut self, room_id: &str, user_id: &str) {
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(room_id.to_string());
    }

    fn unlink(&mut self, room_id: &str, user_id: &str) {
        if let Some(rooms) = self.by_user.get_mut(user_id) {
            rooms.remove(room_id);

            if rooms.is_empty() {
                self.by_user.remove(user_id);
            }
        }
    }

    fn insert(&mut self, session: Session<K>) -> Arc<Session<K>> {
        let room_id = session.room_id.clone();

        if let Some(subscription) = &session.subscription {
            self.by_subscription
                .entry(subscription.clone())
                .or_default()
                .insert(room_id.clone());
        }

        for user_id in session.members.keys() {
            self.link(&room_id, user_id);
        }

        let session = Arc::new(session);
        self.sessions.insert(room_id, session.clone());
        session
    }

    /// The only way a session ever leaves the registry.
    fn teardown(&mut self, room_id: &str) -> Option<Arc<Session<K>>> {
        let mut session = self.sessions.remove(room_id)?;

        for user_id in session.members.keys() {
            self.unlink(room_id, user_id);
        }

        if let Some(subscription) = &session.subscription {
            if let Some(rooms) = self.by_subscription.get_mut(subscription) {
                rooms.remove(room_id);

                if rooms.is_empty() {
                    self.by_subscription.remove(subscription);
                }
            }
        }

        let ended = Arc::make_mut(&mut session);
        ended.status = SessionStatus::Ended;
        ended.ended_at = Some(Utc::now());

        debug!("{} {} torn down", K::NAME, room_id);

        Some(session)
    }

    fn remove_member(&mut self, room_id: &str, user_id: &str) -> Removal<K> {
        let Some(session) = self.sessions.get(room_id) else {
            return Removal::Absent;
        };

        if !session.is_member(user_id) {
            return Removal::Absent;
        }

        if session.is_host(user_id) {
            return self
                .teardown(room_id)
                .map(|s| Removal::Ended(s, EndCause::HostLeft))
                .unwrap_or(Removal::Absent);
        }

        if session.member_count() == 1 {
            return self
                .teardown(room_id)
                .map(|s| Removal::Ended(s, EndCause::Empty))
                .unwrap_or(Removal::Absent);
        }

        self.unlink(room_id, user_id);

        let Some(entry) = self.sessions.get_mut(room_id) else {
            return Removal::Absent;
        };

        Arc::make_mut(entry).members.remove(user_id);
        Removal::Left(entry.clone())
    }

    fn rooms_of(&self, user_id: &str) -> Vec<RoomId> {
        self.by_user
            .get(user_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<K: SessionKind> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SessionKind> Registry<K> {
    pub fn new() -> Self {
        Self {
            index: Default::default(),
        }
    }

    /// Opens a new session with the host as its first member
    pub fn create(&self, new_session: NewSession<K>) -> Result<Arc<Session<K>>, RegistryError> {
        let mut index = self.index.write();

        if index.sessions.contains_key(&new_session.room_id) {
            return Err(RegistryError::RoomTaken {
                kind: K::NAME,
                room_id: new_session.room_id,
            });
        }

        if K::EXCLUSIVE_PER_SUBSCRIPTION {
            if let Some(subscription) = &new_session.subscription {
                let busy = index
                    .by_subscription
                    .get(subscription)
                    .is_some_and(|rooms| !rooms.is_empty());

                if busy {
                    return Err(RegistryError::SubscriptionBusy {
                        kind: K::NAME,
                        subscription: subscription.clone(),
                    });
                }
            }
        }

        Ok(index.insert(Session::open(new_session)))
    }

    pub fn get(&self, room_id: &str) -> Result<Arc<Session<K>>, RegistryError> {
        self.index
            .read()
            .sessions
            .get(room_id)
            .cloned()
            .ok_or_else(|| Index::<K>::not_found(room_id))
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.index.read().sessions.contains_key(room_id)
    }

    pub fn list_all(&self) -> Vec<Arc<Session<K>>> {
        self.index.read().sessions.values().cloned().collect()
    }

    pub fn list_by_subscription(&self, subscription: &str) -> Vec<Arc<Session<K>>> {
        let index = self.index.read();

        index
            .by_subscription
            .get(subscription)
            .into_iter()
            .flatten()
            .filter_map(|room_id| index.sessions.get(room_id).cloned())
            .collect()
    }

    pub fn list_by_user(&self, user_id: &str) -> Vec<Arc<Session<K>>> {
        let index = self.index.read();

        index
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|room_id| index.sessions.get(room_id).cloned())
            .collect()
    }

    /// How many sessions are active
    pub fn len(&self) -> usize {
        self.index.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a member, or refreshes the details of one that is already in.
    pub fn add_member(
        &self,
        room_id: &str,
        member: Member<K::Media>,
    ) -> Result<Arc<Session<K>>, RegistryError> {
        self.join(room_id, member).map(|(session, _)| session)
    }

    /// Like [Registry::add_member], but also reports whether the member is new to the session.
    ///
    /// Capacity rules of the session kind are checked under the same lock,
    /// so two racing joins can never both take the last seat.
    pub fn join(
        &self,
        room_id: &str,
        member: Member<K::Media>,
    ) -> Result<(Arc<Session<K>>, bool), RegistryError> {
        let mut index = self.index.write();

        let current = index
            .sessions
            .get(room_id)
            .ok_or_else(|| Index::<K>::not_found(room_id))?;

        K::admit(current, &member.user_id)?;

        let user_id = member.user_id.clone();
        let session = index.session_mut(room_id)?;

        let (member, is_new) = match session.members.remove(&user_id) {
            // Keep the join time and media state of a returning member
            Some(existing) => (
                Member {
                    media: existing.media,
                    joined_at: existing.joined_at,
                    ..member
                },
                false,
            ),
            None => (member, true),
        };

        session.members.insert(user_id.clone(), member);
        index.link(room_id, &user_id);

        let session = index
            .sessions
            .get(room_id)
            .cloned()
            .ok_or_else(|| Index::<K>::not_found(room_id))?;

        Ok((session, is_new))
    }

    /// Removes a member. Removing the host, or the last member, ends the session.
    pub fn remove_member(&self, room_id: &str, user_id: &str) -> Removal<K> {
        self.index.write().remove_member(room_id, user_id)
    }

    /// Removes a user from every session they are in, in one critical section.
    /// Only rooms the user was actually in are reported.
    pub fn remove_user(&self, user_id: &str) -> Vec<Removal<K>> {
        let mut index = self.index.write();

        index
            .rooms_of(user_id)
            .into_iter()
            .map(|room_id| index.remove_member(&room_id, user_id))
            .filter(Removal::found)
            .collect()
    }

    /// Ends a session regardless of who is still in it
    pub fn end(&self, room_id: &str) -> Result<Arc<Session<K>>, RegistryError> {
        self.index
            .write()
            .teardown(room_id)
            .ok_or_else(|| Index::<K>::not_found(room_id))
    }

    /// Ends a session if `allowed` accepts it. The check and the teardown share one critical
    /// section, so a room id that was ended and reused in between is never ended by mistake.
    pub fn end_if<F>(&self, room_id: &str, allowed: F) -> Result<Arc<Session<K>>, RegistryError>
    where
        F: FnOnce(&Session<K>) -> bool,
    {
        let mut index = self.index.write();
        index.guard(room_id, "end", allowed)?;

        index
            .teardown(room_id)
            .ok_or_else(|| Index::<K>::not_found(room_id))
    }

    /// Applies a change to a session's shared fields. Returning an error leaves the session as it was,
    /// so `change` must validate before it mutates.
    fn modify<F>(&self, room_id: &str, change: F) -> Result<Arc<Session<K>>, RegistryError>
    where
        F: FnOnce(&mut Session<K>) -> Result<(), RegistryError>,
    {
        self.modify_if(room_id, "change", |_| true, change)
    }

    /// [Registry::modify], refused with [RegistryError::NotHost] unless `allowed` accepts the session
    fn modify_if<A, F>(
        &self,
        room_id: &str,
        action: &'static str,
        allowed: A,
        change: F,
    ) -> Result<Arc<Session<K>>, RegistryError>
    where
        A: FnOnce(&Session<K>) -> bool,
        F: FnOnce(&mut Session<K>) -> Result<(), RegistryError>,
    {
        let mut index = self.index.write();
        index.guard(room_id, action, allowed)?;
        change(index.session_mut(room_id)?)?;

        index
            .sessions
            .get(room_id)
            .cloned()
            .ok_or_else(|| Index::<K>::not_found(room_id))
    }
}

impl Registry<Meeting> {
    /// Changes what non-host participants may use, switching off anything that was revoked.
    /// Only applied when `allowed` accepts the meeting.
    pub fn update_permissions<A>(
        &self,
        room_id: &str,
        toggle: MediaToggle,
        allowed: A,
    ) -> Result<Arc<Session<Meeting>>, RegistryError>
    where
        A: FnOnce(&Session<Meeting>) -> bool,
    {
        self.modify_if(room_id, "change the permissions of", allowed, |session| {
            session.kind.permissions.apply(toggle);

            let permissions = session.kind.permissions;
            let host = session.host.clone();

            session
                .members
                .values_mut()
                .filter(|m| m.user_id != host)
                .for_each(|m| m.media.restrict_to(&permissions));

            Ok(())
        })
    }

    /// Changes a participant's own media flags
    pub fn update_participant_media(
        &self,
        room_id: &str,
        user_id: &str,
        toggle: MediaToggle,
    ) -> Result<Arc<Session<Meeting>>, RegistryError> {
        self.modify(room_id, |session| {
            if !session.is_host(user_id) {
                if let Some(medium) =
                    ParticipantMedia::forbidden_by(&toggle, &session.kind.permissions)
                {
                    return Err(RegistryError::NotPermitted {
                        room_id: session.room_id.clone(),
                        medium,
                    });
                }
            }

            let room_id = session.room_id.clone();
            let member = session
                .members
                .get_mut(user_id)
                .ok_or_else(|| RegistryError::NotMember {
                    room_id,
                    user_id: user_id.to_string(),
                })?;

            member.media.apply(toggle);
            Ok(())
        })
    }
}

impl Registry<Stream> {
    /// Changes which media the broadcaster is sending. Only `host_id` may do this.
    pub fn update_media(
        &self,
        room_id: &str,
        host_id: &str,
        update: StreamMediaUpdate,
    ) -> Result<Arc<Session<Stream>>, RegistryError> {
        let is_host = |session: &Session<Stream>| session.is_host(host_id);

        self.modify_if(room_id, "change the media of", is_host, |session| {
            session.kind.media.apply(update);
            Ok(())
        })
    }
}
