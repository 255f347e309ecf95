use huddle_core::Config;
use serde_json::{json, Value};

use crate::{
    test_util::identity, Collab, ConnectionContext, EndReason, ErrorCode, EventReceiver,
    Identity, MemoryDirectory, ServerEvent, UserType,
};

struct Client {
    context: ConnectionContext,
    receiver: EventReceiver,
}

impl Client {
    fn events(&mut self) -> Vec<ServerEvent> {
        let mut events = vec![];

        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }

        events
    }

    fn errors(&mut self) -> Vec<(ErrorCode, String, Option<u64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Error {
                    code,
                    message,
                    retry_after,
                } => Some((code, message, retry_after)),
                _ => None,
            })
            .collect()
    }

    fn error_code(&mut self) -> Option<ErrorCode> {
        self.errors().first().map(|(code, _, _)| *code)
    }
}

fn collab() -> Collab {
    Collab::new(Config::default(), MemoryDirectory::new())
}

fn connect_as(collab: &Collab, identity: Identity) -> Client {
    let (context, receiver) = collab.connect(identity);
    let mut client = Client { context, receiver };

    assert!(matches!(
        client.events().as_slice(),
        [ServerEvent::ConnectionConfirmed { .. }]
    ));

    client
}

fn connect(collab: &Collab, id: &str, user_type: UserType) -> Client {
    connect_as(collab, identity(id, user_type, "sub-123"))
}

fn emit(collab: &Collab, client: &Client, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data });
    collab.handle_text(&client.context, &frame.to_string());
}

fn start_stream(collab: &Collab, client: &Client, stream_id: &str) {
    emit(
        collab,
        client,
        "startStream",
        json!({ "streamId": stream_id, "title": "Office hours" }),
    );
}

#[test]
fn one_active_meeting_per_subscription() {
    let collab = collab();
    let mut alice = connect(&collab, "alice", UserType::Instructor);

    emit(&collab, &alice, "createMeeting", json!({ "roomId": "room-a" }));

    let events = alice.events();
    let [ServerEvent::MeetingCreated(meeting)] = events.as_slice() else {
        panic!("expected meetingCreated, got {events:?}");
    };

    assert_eq!(meeting.room_id, "room-a");
    assert_eq!(meeting.participant_count, 1);
    assert!(collab.meetings.get("room-a").unwrap().is_member("alice"));
    assert_eq!(collab.meetings.list_by_subscription("sub-123").len(), 1);

    emit(&collab, &alice, "createMeeting", json!({ "roomId": "room-b" }));

    let errors = alice.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorCode::Conflict);
    assert_eq!(errors[0].1, "Subscription already has an active meeting");
    assert!(!collab.meetings.contains("room-b"));
}

#[test]
fn meeting_room_ids_are_generated() {
    let collab = collab();
    let alice = connect(&collab, "alice", UserType::Staff);

    let meeting = collab
        .create_meeting(&alice.context.identity, "sub-123", Default::default())
        .unwrap();

    assert_eq!(meeting.room_id.len(), 10);
    assert!(meeting.room_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(meeting.kind.title, "Alice's meeting");
}

#[test]
fn students_cannot_create_meetings() {
    let collab = collab();
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(&collab, &bob, "createMeeting", json!({}));

    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));
    assert!(collab.meetings.is_empty());
}

#[test]
fn joining_a_full_stream_is_refused() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);
    let mut carol = connect(&collab, "carol", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    dana.events();
    bob.events();
    carol.events();

    for i in 0..99 {
        collab
            .streams
            .add_member("live-1", huddle_core::Member::new(format!("viewer-{i}"), "Viewer", ""))
            .unwrap();
    }

    emit(&collab, &bob, "joinStream", json!("live-1"));

    let events = bob.events();
    let [ServerEvent::StreamJoined(stream)] = events.as_slice() else {
        panic!("expected streamJoined, got {events:?}");
    };

    assert_eq!(stream.viewer_count, 100);
    assert!(dana.events().iter().any(|e| matches!(
        e,
        ServerEvent::ViewerJoined { user_id, viewer_count: 100, .. } if user_id == "bob"
    )));

    emit(&collab, &carol, "joinStream", json!("live-1"));

    assert_eq!(carol.error_code(), Some(ErrorCode::StreamFull));
    assert_eq!(collab.streams.get("live-1").unwrap().viewer_count(), 100);

    emit(&collab, &bob, "joinStream", json!("live-1"));
    assert!(
        matches!(bob.events().as_slice(), [ServerEvent::StreamJoined(_)]),
        "re-joining at capacity is fine"
    );
}

#[test]
fn host_disconnect_ends_the_stream() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);
    let mut carol = connect(&collab, "carol", UserType::Student);

    start_stream(&collab, &dana, "live-2");
    emit(&collab, &bob, "joinStream", json!("live-2"));
    emit(&collab, &carol, "joinStream", json!("live-2"));
    bob.events();
    carol.events();

    collab.disconnect(dana.context.id);

    for viewer in [&mut bob, &mut carol] {
        assert!(viewer.events().iter().any(|e| matches!(
            e,
            ServerEvent::StreamEnded { stream_id, reason: EndReason::HostDisconnected }
                if stream_id == "live-2"
        )));
    }

    assert!(!collab.streams.contains("live-2"));
    assert!(collab.streams.list_by_user("bob").is_empty());
    assert!(collab.streams.list_by_user("carol").is_empty());
    assert_eq!(collab.admission.active_for("dana"), 0);
    assert_eq!(collab.admission.active_total(), 0);

    // Running cleanup twice changes nothing
    collab.disconnect(dana.context.id);
    assert!(bob.events().is_empty());
}

#[test]
fn second_stream_within_cooldown_is_refused() {
    let collab = collab();
    let mut erin = connect(&collab, "erin", UserType::Student);

    start_stream(&collab, &erin, "live-a");
    assert!(matches!(
        erin.events().as_slice(),
        [ServerEvent::StreamStarted(_), ServerEvent::NewStreamAvailable(_)]
    ));

    start_stream(&collab, &erin, "live-b");

    let errors = erin.errors();
    assert_eq!(errors.len(), 1);

    let (code, _, retry_after) = &errors[0];
    assert_eq!(*code, ErrorCode::Cooldown);
    assert!(retry_after.is_some_and(|secs| secs > 0));
    assert!(!collab.streams.contains("live-b"));

    emit(&collab, &erin, "endStream", json!("live-a"));
    erin.events();

    start_stream(&collab, &erin, "live-b");
    assert_eq!(
        erin.error_code(),
        Some(ErrorCode::Cooldown),
        "ending a stream does not reset the cooldown"
    );
}

#[test]
fn taken_stream_id_does_not_cost_a_cooldown() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let mut erin = connect(&collab, "erin", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    erin.events();

    start_stream(&collab, &erin, "live-1");
    assert_eq!(erin.error_code(), Some(ErrorCode::Conflict));
    assert_eq!(collab.admission.active_for("erin"), 0);

    start_stream(&collab, &erin, "live-2");
    assert!(erin
        .events()
        .iter()
        .any(|e| matches!(e, ServerEvent::StreamStarted(_))));
}

#[test]
fn leaving_a_stream_you_are_not_in() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let mut mallory = connect(&collab, "mallory", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    mallory.events();

    emit(&collab, &mallory, "leaveStream", json!("live-1"));
    assert_eq!(mallory.error_code(), Some(ErrorCode::NotFound));

    emit(&collab, &mallory, "leaveStream", json!("nowhere"));
    assert_eq!(mallory.error_code(), Some(ErrorCode::NotFound));

    let stream = collab.streams.get("live-1").unwrap();
    assert_eq!(stream.member_count(), 1);
}

#[test]
fn viewers_leaving_are_announced() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &bob, "joinStream", json!("live-1"));
    dana.events();
    bob.events();

    emit(&collab, &bob, "leaveStream", json!("live-1"));

    for client in [&mut dana, &mut bob] {
        assert!(client.events().iter().any(|e| matches!(
            e,
            ServerEvent::ViewerLeft { user_id, viewer_count: 0, .. } if user_id == "bob"
        )));
    }

    assert!(collab.streams.contains("live-1"));
}

#[test]
fn chat_reaches_the_room_including_the_sender() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);
    let mut carol = connect(&collab, "carol", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &bob, "joinStream", json!("live-1"));
    dana.events();
    bob.events();
    carol.events();

    emit(
        &collab,
        &bob,
        "streamMessage",
        json!({ "streamId": "live-1", "message": "hello" }),
    );

    for client in [&mut dana, &mut bob] {
        assert!(client.events().iter().any(|e| matches!(
            e,
            ServerEvent::StreamMessageReceived { user_name, message, .. }
                if user_name == "Bob" && message == "hello"
        )));
    }

    assert!(carol.events().is_empty(), "outsiders don't see the chat");

    emit(
        &collab,
        &bob,
        "streamMessage",
        json!({ "streamId": "live-1", "message": "x".repeat(2001) }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::ValidationError));
}

#[test]
fn disabled_chat_is_host_only() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(
        &collab,
        &dana,
        "startStream",
        json!({ "streamId": "live-1", "title": "Quiet", "chatEnabled": false }),
    );
    emit(&collab, &bob, "joinStream", json!("live-1"));
    dana.events();
    bob.events();

    emit(
        &collab,
        &bob,
        "streamMessage",
        json!({ "streamId": "live-1", "message": "hi" }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));

    emit(
        &collab,
        &dana,
        "streamMessage",
        json!({ "streamId": "live-1", "message": "welcome" }),
    );
    assert!(bob
        .events()
        .iter()
        .any(|e| matches!(e, ServerEvent::StreamMessageReceived { .. })));
}

#[test]
fn private_streams_are_unlisted_but_joinable() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(
        &collab,
        &dana,
        "startStream",
        json!({ "streamId": "secret", "title": "Private", "isPublic": false }),
    );

    assert!(bob.events().is_empty(), "no announcement for private streams");

    emit(&collab, &bob, "getActiveStreams", Value::Null);
    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::ActiveStreams(streams)] if streams.is_empty()
    ));

    emit(&collab, &bob, "joinStream", json!("secret"));
    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::StreamJoined(_)]
    ));
}

#[test]
fn only_the_host_controls_the_stream() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &bob, "joinStream", json!("live-1"));
    dana.events();
    bob.events();

    emit(&collab, &bob, "endStream", json!("live-1"));
    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));

    emit(
        &collab,
        &bob,
        "updateStreamMedia",
        json!({ "streamId": "live-1", "hasVideo": true }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));

    emit(
        &collab,
        &dana,
        "updateStreamMedia",
        json!({ "streamId": "live-1", "hasVideo": true }),
    );
    assert!(bob.events().iter().any(|e| matches!(
        e,
        ServerEvent::StreamMediaUpdated { media, .. } if media.has_video && !media.has_audio
    )));

    emit(&collab, &dana, "endStream", json!("live-1"));
    assert!(bob.events().iter().any(|e| matches!(
        e,
        ServerEvent::StreamEnded { reason: EndReason::HostEnded, .. }
    )));
    assert!(!collab.streams.contains("live-1"));
}

#[test]
fn signals_are_relayed() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);
    let mut carol = connect(&collab, "carol", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &bob, "joinStream", json!("live-1"));
    emit(&collab, &carol, "joinStream", json!("live-1"));
    dana.events();
    bob.events();
    carol.events();

    emit(
        &collab,
        &dana,
        "streamSignal",
        json!({ "streamId": "live-1", "signal": { "sdp": "offer" }, "targetUserId": "bob" }),
    );

    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::StreamSignal { from_user_id, .. }] if from_user_id == "dana"
    ));
    assert!(carol.events().is_empty());

    emit(
        &collab,
        &dana,
        "streamSignal",
        json!({ "streamId": "live-1", "signal": { "candidate": "c" } }),
    );

    assert_eq!(bob.events().len(), 1);
    assert_eq!(carol.events().len(), 1);
    assert!(dana.events().is_empty(), "the sender is skipped");

    emit(
        &collab,
        &dana,
        "streamSignal",
        json!({ "streamId": "live-1", "signal": {}, "targetUserId": "ghost" }),
    );
    assert_eq!(dana.error_code(), Some(ErrorCode::NotFound));
}

#[test]
fn direct_signals_only_need_a_connected_target() {
    let collab = collab();
    let mut alice = connect(&collab, "alice", UserType::Instructor);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(
        &collab,
        &bob,
        "streamSignal",
        json!({ "streamId": "not-live", "signal": { "sdp": "offer" }, "targetUserId": "alice" }),
    );

    assert!(bob.errors().is_empty());
    assert!(matches!(
        alice.events().as_slice(),
        [ServerEvent::StreamSignal { stream_id, from_user_id, .. }]
            if stream_id == "not-live" && from_user_id == "bob"
    ));

    emit(
        &collab,
        &bob,
        "meetingSignal",
        json!({ "roomId": "room-x", "signal": { "sdp": "answer" }, "targetUserId": "alice" }),
    );

    assert!(bob.errors().is_empty());
    assert!(matches!(
        alice.events().as_slice(),
        [ServerEvent::MeetingSignal { room_id, .. }] if room_id == "room-x"
    ));

    // Room-wide signals still need a live room the sender is in
    emit(
        &collab,
        &bob,
        "streamSignal",
        json!({ "streamId": "not-live", "signal": {} }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::NotFound));
    assert!(alice.events().is_empty());
}

#[test]
fn reused_stream_ids_belong_to_the_new_host() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut erin = connect(&collab, "erin", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &dana, "endStream", json!("live-1"));
    start_stream(&collab, &erin, "live-1");
    dana.events();
    erin.events();

    emit(&collab, &dana, "endStream", json!("live-1"));
    assert_eq!(dana.error_code(), Some(ErrorCode::Forbidden));

    emit(
        &collab,
        &dana,
        "updateStreamMedia",
        json!({ "streamId": "live-1", "hasAudio": true }),
    );
    assert_eq!(dana.error_code(), Some(ErrorCode::Forbidden));

    let stream = collab.streams.get("live-1").unwrap();
    assert_eq!(stream.host, "erin");
    assert!(!stream.kind.media.has_audio);
    assert!(erin.events().is_empty());
}

#[test]
fn rejoining_is_not_announced_again() {
    let collab = collab();
    let mut dana = connect(&collab, "dana", UserType::Student);
    let mut bob = connect(&collab, "bob", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    dana.events();
    emit(&collab, &bob, "joinStream", json!("live-1"));
    assert!(matches!(
        dana.events().as_slice(),
        [ServerEvent::ViewerJoined { viewer_count: 1, .. }]
    ));
    bob.events();

    emit(&collab, &bob, "joinStream", json!("live-1"));
    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::StreamJoined(_)]
    ));
    assert!(dana.events().is_empty());

    emit(&collab, &dana, "joinStream", json!("live-1"));
    assert!(matches!(
        dana.events().as_slice(),
        [ServerEvent::StreamJoined(_)]
    ));
    assert!(bob.events().is_empty());
    assert_eq!(collab.streams.get("live-1").unwrap().viewer_count(), 1);
}

#[test]
fn reconnecting_before_cleanup_keeps_sessions() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let bob = connect(&collab, "bob", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &bob, "joinStream", json!("live-1"));

    // bob's last connection closed, but a new one is already up when cleanup runs
    let identity = Identity::clone(&bob.context.identity);
    assert!(collab
        .connections
        .unregister(bob.context.id)
        .is_some_and(|d| d.was_last));
    let again = connect_as(&collab, identity.clone());

    assert!(!collab.leave_everything(&identity));
    assert!(collab.streams.get("live-1").unwrap().is_member("bob"));

    collab.disconnect(again.context.id);
    assert!(!collab.streams.get("live-1").unwrap().is_member("bob"));
}

#[test]
fn cleanup_waits_for_the_last_connection() {
    let collab = collab();
    let dana = connect(&collab, "dana", UserType::Student);
    let phone = connect(&collab, "bob", UserType::Student);
    let laptop = connect(&collab, "bob", UserType::Student);

    start_stream(&collab, &dana, "live-1");
    emit(&collab, &phone, "joinStream", json!("live-1"));

    collab.disconnect(phone.context.id);
    assert!(collab.streams.get("live-1").unwrap().is_member("bob"));

    collab.disconnect(laptop.context.id);
    assert!(!collab.streams.get("live-1").unwrap().is_member("bob"));
}

#[test]
fn revoked_permissions_apply_to_participants() {
    let collab = collab();
    let mut alice = connect(&collab, "alice", UserType::Instructor);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(&collab, &alice, "createMeeting", json!({ "roomId": "room-a" }));
    emit(&collab, &bob, "joinMeeting", json!("room-a"));

    assert!(alice.events().iter().any(|e| matches!(
        e,
        ServerEvent::ParticipantJoined { participant, participant_count: 2, .. }
            if participant.user_id == "bob"
    )));
    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::MeetingJoined(_)]
    ));

    emit(
        &collab,
        &bob,
        "updateParticipantMedia",
        json!({ "roomId": "room-a", "mic": true }),
    );
    assert!(alice.events().iter().any(|e| matches!(
        e,
        ServerEvent::ParticipantMediaUpdated { user_id, media, .. } if user_id == "bob" && media.mic
    )));
    bob.events();

    emit(
        &collab,
        &bob,
        "updatePermissions",
        json!({ "roomId": "room-a", "mic": false }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));

    emit(
        &collab,
        &alice,
        "updatePermissions",
        json!({ "roomId": "room-a", "mic": false }),
    );

    let events = bob.events();
    let Some(ServerEvent::PermissionsUpdated {
        permissions,
        participants,
        ..
    }) = events.first()
    else {
        panic!("expected permissionsUpdated, got {events:?}");
    };

    assert!(!permissions.mic);
    assert!(participants
        .iter()
        .any(|p| p.user_id == "bob" && !p.media.mic));

    emit(
        &collab,
        &bob,
        "updateParticipantMedia",
        json!({ "roomId": "room-a", "mic": true }),
    );
    assert_eq!(bob.error_code(), Some(ErrorCode::Forbidden));
}

#[test]
fn group_meetings_need_a_shared_group() {
    let collab = collab();
    let mut alice = connect(&collab, "alice", UserType::Instructor);

    let mut insider = identity("bob", UserType::Student, "sub-123");
    insider.groups = vec!["class-7b".to_string()];

    let mut bob = connect_as(&collab, insider);
    let mut carol = connect(&collab, "carol", UserType::Student);
    let mut outsider = connect_as(&collab, identity("olga", UserType::Student, "sub-456"));

    emit(
        &collab,
        &alice,
        "createMeeting",
        json!({ "roomId": "room-g", "accessType": "group", "groupIds": ["class-7b"] }),
    );
    alice.events();

    emit(&collab, &carol, "joinMeeting", json!("room-g"));
    assert_eq!(carol.error_code(), Some(ErrorCode::Forbidden));

    emit(&collab, &outsider, "joinMeeting", json!("room-g"));
    assert_eq!(outsider.error_code(), Some(ErrorCode::Forbidden));

    emit(&collab, &bob, "joinMeeting", json!("room-g"));
    assert!(matches!(
        bob.events().as_slice(),
        [ServerEvent::MeetingJoined(_)]
    ));
}

#[test]
fn host_leaving_ends_the_meeting() {
    let collab = collab();
    let alice = connect(&collab, "alice", UserType::Instructor);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(&collab, &alice, "createMeeting", json!({ "roomId": "room-a" }));
    emit(&collab, &bob, "joinMeeting", json!("room-a"));
    bob.events();

    emit(&collab, &alice, "leaveMeeting", json!("room-a"));

    assert!(bob.events().iter().any(|e| matches!(
        e,
        ServerEvent::MeetingEnded { reason: EndReason::HostLeft, .. }
    )));
    assert!(collab.meetings.is_empty());
    assert!(collab.meetings.list_by_subscription("sub-123").is_empty());
}

#[test]
fn meeting_host_disconnect_cascades() {
    let collab = collab();
    let alice = connect(&collab, "alice", UserType::Instructor);
    let mut bob = connect(&collab, "bob", UserType::Student);

    emit(&collab, &alice, "createMeeting", json!({ "roomId": "room-a" }));
    emit(&collab, &bob, "joinMeeting", json!("room-a"));
    bob.events();

    collab.disconnect(alice.context.id);

    assert!(bob.events().iter().any(|e| matches!(
        e,
        ServerEvent::MeetingEnded { reason: EndReason::HostDisconnected, .. }
    )));
    assert!(collab.meetings.list_by_user("bob").is_empty());
}

#[test]
fn rest_and_events_share_state() {
    let collab = collab();
    let alice = connect(&collab, "alice", UserType::Instructor);
    let mut bob = connect(&collab, "bob", UserType::Student);

    collab
        .create_meeting(&alice.context.identity, "sub-123", Default::default())
        .unwrap();

    emit(&collab, &bob, "getActiveMeetings", Value::Null);

    let events = bob.events();
    let [ServerEvent::ActiveMeetings(meetings)] = events.as_slice() else {
        panic!("expected activeMeetings, got {events:?}");
    };

    assert_eq!(meetings.len(), 1);

    let room_id = meetings[0].room_id.clone();
    assert!(
        collab.get_meeting(&alice.context.identity, "sub-456", &room_id).is_err(),
        "meetings of other subscriptions are hidden"
    );

    collab
        .end_meeting(&alice.context.identity, &room_id, Some("sub-123"))
        .unwrap();
    assert!(collab.meetings.is_empty());
}

#[test]
fn malformed_frames_are_reported() {
    let collab = collab();
    let mut bob = connect(&collab, "bob", UserType::Student);

    collab.handle_text(&bob.context, "{{{");
    assert_eq!(bob.error_code(), Some(ErrorCode::ValidationError));

    emit(&collab, &bob, "startStream", json!({ "title": "No id" }));
    assert_eq!(bob.error_code(), Some(ErrorCode::ValidationError));
    assert!(collab.streams.is_empty());
}
