use colloquy::config::MessagingConfig;
use colloquy::domain::capability::Capability;
use colloquy::domain::conversation::{ConversationArea, ConversationType, NewConversation};
use colloquy::domain::message::MessageFormat;
use colloquy::domain::summary::DetailOptions;
use colloquy::error::AppError;

mod common;

async fn individual(app: &common::TestApp, a: i64, b: i64) -> i64 {
    app.services
        .conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![a, b]))
        .await
        .unwrap()
        .id
}

async fn group(app: &common::TestApp, name: &str, members: Vec<i64>) -> i64 {
    app.services
        .conversations
        .create_conversation(NewConversation::new(ConversationType::Group, members).with_name(name))
        .await
        .unwrap()
        .id
}

async fn send(app: &common::TestApp, from: i64, conversation: i64, text: &str) -> i64 {
    app.services.messages.send_message_to_conversation(from, conversation, text, MessageFormat::Plain).await.unwrap().id
}

#[tokio::test]
async fn test_listing_order_and_pagination() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    app.enrol_together(&[alice, bob, carol]).await;

    let with_bob = individual(&app, alice, bob).await;
    let _silent = individual(&app, alice, carol).await;
    let older_group = group(&app, "Older", vec![alice, bob]).await;
    let newer_group = group(&app, "Newer", vec![alice, carol]).await;
    let busy_group = group(&app, "Busy", vec![alice, bob, carol]).await;

    send(&app, bob, with_bob, "first").await;
    send(&app, carol, busy_group, "second").await;

    let listed = app.services.aggregation.get_conversations(alice, 0, 0, None, None).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|c| c.id).collect();

    // Individual conversations without messages are not listed.
    assert_eq!(ids, vec![busy_group, with_bob, newer_group, older_group]);

    let page = app.services.aggregation.get_conversations(alice, 1, 2, None, None).await.unwrap();
    assert_eq!(page.iter().map(|c| c.id).collect::<Vec<_>>(), vec![with_bob, newer_group]);
}

#[tokio::test]
async fn test_listing_summary_fields() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    app.enrol_together(&[alice, bob]).await;

    let conversation = individual(&app, alice, bob).await;
    send(&app, bob, conversation, "one").await;
    let last = send(&app, bob, conversation, "two").await;
    app.services.conversations.mute_conversation(alice, conversation).await.unwrap();

    let listed = app.services.aggregation.get_conversations(alice, 0, 0, None, None).await.unwrap();
    let summary = listed.iter().find(|c| c.id == conversation).unwrap();

    assert_eq!(summary.r#type, ConversationType::Individual);
    assert_eq!(summary.member_count, 2);
    assert!(summary.is_muted);
    assert!(!summary.is_favourite);
    assert!(!summary.is_read);
    assert_eq!(summary.unread_count, Some(2));
    assert_eq!(summary.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![last]);
    // Previews show the other member, never the requester.
    assert_eq!(summary.members.iter().map(|m| m.id).collect::<Vec<_>>(), vec![bob]);

    app.services.messages.mark_all_messages_as_read(alice, Some(conversation)).await.unwrap();
    let listed = app.services.aggregation.get_conversations(alice, 0, 0, None, None).await.unwrap();
    let summary = listed.iter().find(|c| c.id == conversation).unwrap();
    assert!(summary.is_read);
    assert_eq!(summary.unread_count, None);
}

#[tokio::test]
async fn test_listing_limit_is_exact_or_unlimited() {
    let app = common::TestApp::spawn_with_messaging(MessagingConfig { page_limit_max: 2, ..Default::default() }).await;
    let alice = app.create_user("alice").await;
    for name in ["One", "Two", "Three"] {
        group(&app, name, vec![alice]).await;
    }
    let aggregation = &app.services.aggregation;

    assert_eq!(aggregation.get_conversations(alice, 0, 3, None, None).await.unwrap().len(), 3);
    assert_eq!(aggregation.get_conversations(alice, 0, 0, None, None).await.unwrap().len(), 3);
    assert_eq!(aggregation.get_conversations(alice, 0, 2, None, None).await.unwrap().len(), 2);
    assert_eq!(aggregation.get_conversations(alice, 2, 5, None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_listing_filters() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    app.services.contacts.add_contact(alice, bob).await.unwrap();

    let conversation = individual(&app, alice, bob).await;
    send(&app, bob, conversation, "hey").await;
    let team = group(&app, "Team", vec![alice, bob]).await;
    let own = app.services.conversations.get_self_conversation(alice).await.unwrap();
    app.services.conversations.set_favourite_conversation(own.id, alice).await.unwrap();
    let hidden = group(&app, "Hidden", vec![alice, bob]).await;
    app.services.conversations.disable_conversation(hidden).await.unwrap();

    let aggregation = &app.services.aggregation;

    let groups = aggregation.get_conversations(alice, 0, 0, Some(ConversationType::Group.code()), None).await.unwrap();
    assert_eq!(groups.iter().map(|c| c.id).collect::<Vec<_>>(), vec![team]);

    let starred = aggregation.get_conversations(alice, 0, 0, None, Some(true)).await.unwrap();
    assert_eq!(starred.iter().map(|c| c.id).collect::<Vec<_>>(), vec![own.id]);

    let unstarred = aggregation.get_conversations(alice, 0, 0, None, Some(false)).await.unwrap();
    let mut ids: Vec<i64> = unstarred.iter().map(|c| c.id).collect();
    ids.sort_unstable();
    let mut expected = vec![conversation, team];
    expected.sort_unstable();
    assert_eq!(ids, expected);

    // The self conversation previews its only member.
    assert_eq!(starred[0].members.iter().map(|m| m.id).collect::<Vec<_>>(), vec![alice]);

    let invalid = aggregation.get_conversations(alice, 0, 0, Some(9), None).await;
    assert!(matches!(invalid, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_counts_match_listing() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    app.enrol_together(&[alice, bob, carol]).await;

    let with_bob = individual(&app, alice, bob).await;
    individual(&app, alice, carol).await;
    let team = group(&app, "Team", vec![alice, bob, carol]).await;
    group(&app, "Quiet", vec![alice, carol]).await;
    let own = app.services.conversations.get_self_conversation(alice).await.unwrap();
    app.services.conversations.set_favourite_conversation(own.id, alice).await.unwrap();

    send(&app, bob, with_bob, "ping").await;
    send(&app, carol, team, "pong").await;
    app.services.conversations.set_favourite_conversation(team, alice).await.unwrap();

    let aggregation = &app.services.aggregation;
    let counts = aggregation.get_conversation_counts(alice).await.unwrap();

    assert_eq!(counts.favourites, 2);
    assert_eq!(counts.types.individual, 1);
    assert_eq!(counts.types.group, 2);
    assert_eq!(counts.types.self_, 1);

    for r#type in [ConversationType::Individual, ConversationType::Group, ConversationType::SelfConversation] {
        let listed = aggregation.get_conversations(alice, 0, 0, Some(r#type.code()), None).await.unwrap();
        assert_eq!(i64::try_from(listed.len()).unwrap(), counts.types.get(r#type));
    }
    let starred = aggregation.get_conversations(alice, 0, 0, None, Some(true)).await.unwrap();
    assert_eq!(i64::try_from(starred.len()).unwrap(), counts.favourites);

    let unread = aggregation.get_unread_conversation_counts(alice).await.unwrap();
    assert_eq!(unread.favourites, 1);
    assert_eq!(unread.types.individual, 1);
    assert_eq!(unread.types.group, 1);
    assert!(unread.favourites <= counts.favourites);
    for r#type in [ConversationType::Individual, ConversationType::Group, ConversationType::SelfConversation] {
        assert!(unread.types.get(r#type) <= counts.types.get(r#type));
    }
}

#[tokio::test]
async fn test_conversation_detail() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let outsider = app.create_user("outsider").await;
    app.services.contacts.add_contact(alice, bob).await.unwrap();
    app.services.contacts.create_contact_request(alice, carol).await.unwrap();

    let team = group(&app, "Team", vec![alice, bob, carol]).await;
    let first = send(&app, bob, team, "one").await;
    let second = send(&app, carol, team, "two").await;

    let options = DetailOptions { include_contact_requests: true, include_privacy_info: true, ..DetailOptions::default() };
    let detail = app.services.aggregation.get_conversation(alice, team, options).await.unwrap();

    assert_eq!(detail.id, team);
    assert_eq!(detail.name.as_deref(), Some("Team"));
    assert_eq!(detail.member_count, 3);
    assert_eq!(detail.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![second, first]);
    assert!(!detail.can_delete_messages_for_all_users);

    let member = |id: i64| detail.members.iter().find(|m| m.id == id).unwrap();
    assert_eq!(detail.members.len(), 3);
    let me = member(alice);
    assert_eq!((me.can_message, me.requires_contact), (Some(true), Some(false)));
    let bob_info = member(bob);
    assert!(bob_info.is_contact);
    assert_eq!(bob_info.can_message, Some(true));
    let carol_info = member(carol);
    assert!(!carol_info.is_contact);
    assert_eq!(carol_info.contact_requests.as_ref().map(Vec::len), Some(1));

    let oldest_first = DetailOptions { newest_messages_first: false, message_limit: 1, member_limit: 1, ..DetailOptions::default() };
    let detail = app.services.aggregation.get_conversation(alice, team, oldest_first).await.unwrap();
    assert_eq!(detail.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first]);
    assert_eq!(detail.members.len(), 1);
    assert!(detail.members[0].can_message.is_none());

    let denied = app.services.aggregation.get_conversation(outsider, team, DetailOptions::default()).await;
    assert!(matches!(denied, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_detail_of_empty_individual_conversation() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let moderator = app.create_user("moderator").await;
    app.grant(moderator, Capability::DeleteAnyMessage, None, true).await;
    let conversation = individual(&app, alice, bob).await;

    let detail = app.services.aggregation.get_conversation(alice, conversation, DetailOptions::default()).await.unwrap();
    assert!(detail.messages.is_empty());
    assert_eq!(detail.r#type, ConversationType::Individual);
    assert!(!detail.can_delete_messages_for_all_users);
}

#[tokio::test]
async fn test_linked_group_has_subname() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let course = app.enrol_together(&[alice]).await;
    let group_id = app.create_course_group(course, Some("https://example.test/pic.png")).await;

    let conversation = app
        .services
        .conversations
        .create_conversation(
            NewConversation::new(ConversationType::Group, vec![alice])
                .with_area(ConversationArea::new("core_group", "groups", group_id, course)),
        )
        .await
        .unwrap();

    let listed = app.services.aggregation.get_conversations(alice, 0, 0, Some(2), None).await.unwrap();
    let summary = listed.iter().find(|c| c.id == conversation.id).unwrap();

    assert_eq!(summary.subname.as_deref(), Some(format!("Course {}", app.run_id).as_str()));
    assert_eq!(summary.image_url.as_deref(), Some("https://example.test/pic.png"));
}

#[tokio::test]
async fn test_search_messages() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    app.enrol_together(&[alice, bob, carol]).await;
    let needle = format!("needle{}", app.run_id);

    let with_bob = individual(&app, alice, bob).await;
    let team = group(&app, "Team", vec![alice, bob, carol]).await;

    send(&app, bob, with_bob, &format!("old {needle}")).await;
    let latest_individual = send(&app, bob, with_bob, &format!("new {needle}")).await;
    let hidden = send(&app, carol, team, &format!("hidden {needle}")).await;
    let team_match = send(&app, carol, team, &format!("team {needle}")).await;
    send(&app, carol, team, "unrelated").await;
    app.services.messages.delete_message(alice, team_match).await.unwrap();
    app.services.contacts.block_user(alice, carol).await.unwrap();

    let aggregation = &app.services.aggregation;
    let results = aggregation.search_messages(alice, &needle, 0, 0).await.unwrap();

    assert_eq!(results.iter().map(|r| r.message_id).collect::<Vec<_>>(), vec![hidden, latest_individual]);
    let from_carol = &results[0];
    assert!(from_carol.is_blocked);
    assert_eq!(from_carol.conversation_name.as_deref(), Some("Team"));
    assert_eq!(from_carol.other_user_id, None);
    let from_bob = &results[1];
    assert!(!from_bob.is_blocked);
    assert_eq!(from_bob.other_user_id, Some(bob));
    assert_eq!(from_bob.conversation_type, ConversationType::Individual);

    let limited = aggregation.search_messages(alice, &needle, 1, 1).await.unwrap();
    assert_eq!(limited.iter().map(|r| r.message_id).collect::<Vec<_>>(), vec![latest_individual]);

    assert!(aggregation.search_messages(alice, "   ", 0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_message_search_users() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let stranger = app.create_user("stranger").await;
    app.services.contacts.add_contact(alice, bob).await.unwrap();
    app.enrol_together(&[alice, carol]).await;
    app.services.contacts.block_user(alice, carol).await.unwrap();
    let team = group(&app, "Team", vec![alice, bob]).await;

    let results = app.services.aggregation.message_search_users(alice, &app.run_id, 0, 0).await.unwrap();

    assert_eq!(results.contacts.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob]);
    assert_eq!(results.contacts[0].conversations.keys().copied().collect::<Vec<_>>(), vec![team]);
    assert_eq!(results.noncontacts.iter().map(|u| u.id).collect::<Vec<_>>(), vec![carol]);
    assert!(results.noncontacts[0].is_blocked);
    assert!(results.noncontacts.iter().all(|u| u.id != stranger));

    app.grant(alice, Capability::ViewAllProfiles, None, true).await;
    let results = app.services.aggregation.message_search_users(alice, &app.run_id, 0, 0).await.unwrap();
    assert_eq!(results.noncontacts.iter().map(|u| u.id).collect::<Vec<_>>(), vec![carol, stranger]);
}

#[tokio::test]
async fn test_message_search_users_when_disabled() {
    let app = common::TestApp::spawn_with_messaging(MessagingConfig { enabled: false, ..Default::default() }).await;
    let alice = app.create_user("alice").await;

    let result = app.services.aggregation.message_search_users(alice, "anyone", 0, 0).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_member_info() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    app.services.contacts.add_contact(alice, bob).await.unwrap();
    app.services.contacts.block_user(alice, carol).await.unwrap();
    app.delete_user(carol).await;

    let infos = app
        .services
        .aggregation
        .get_member_info(alice, &[carol, bob, i64::MAX, bob], false, true)
        .await
        .unwrap();

    assert_eq!(infos.iter().map(|i| i.id).collect::<Vec<_>>(), vec![carol, bob]);
    assert!(infos[0].is_blocked);
    assert!(infos[0].is_deleted);
    assert_eq!(infos[0].can_message, Some(false));
    assert!(infos[1].is_contact);
    assert_eq!(infos[1].can_message, Some(true));
    assert_eq!(infos[1].requires_contact, Some(false));
    assert!(infos[1].contact_requests.is_none());
}
