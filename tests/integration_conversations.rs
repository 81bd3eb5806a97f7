use colloquy::config::MessagingConfig;
use colloquy::domain::capability::Capability;
use colloquy::domain::conversation::{ConversationArea, ConversationType, NewConversation};
use colloquy::domain::favourite::CONVERSATION_FAVOURITES;
use colloquy::domain::message::MessageFormat;
use colloquy::error::AppError;
use colloquy::services::conversation_service::conversation_type;

mod common;

#[tokio::test]
async fn test_individual_conversation_is_deduplicated() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let conversations = &app.services.conversations;

    let first = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();
    let second = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![bob, alice]))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.hash.is_some());
    assert_eq!(conversations.count_conversation_members(first.id).await.unwrap(), 2);

    let found = conversations.get_conversation_between_users(&[bob, alice]).await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(first.id));
}

#[tokio::test]
async fn test_concurrent_creation_yields_one_conversation() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let conversations = app.services.conversations.clone();
    let other = app.services.conversations.clone();

    let (a, b) = tokio::join!(
        conversations.create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob])),
        other.create_conversation(NewConversation::new(ConversationType::Individual, vec![bob, alice])),
    );

    assert_eq!(a.unwrap().id, b.unwrap().id);
}

#[tokio::test]
async fn test_member_count_rules() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let conversations = &app.services.conversations;

    let too_many = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob, carol]))
        .await;
    assert!(matches!(too_many, Err(AppError::InvalidArgument(_))));

    let duplicate_only = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, alice]))
        .await;
    assert!(matches!(duplicate_only, Err(AppError::InvalidArgument(_))));

    let unnamed_group =
        conversations.create_conversation(NewConversation::new(ConversationType::Group, vec![alice, bob])).await;
    assert!(matches!(unnamed_group, Err(AppError::InvalidArgument(_))));

    let unknown_member = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, i64::MAX]))
        .await;
    assert!(matches!(unknown_member, Err(AppError::NotFound)));
    assert!(conversations.get_conversation_between_users(&[alice, i64::MAX]).await.unwrap().is_none());

    assert!(matches!(conversation_type(7), Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_between_users_needs_two_distinct_ids() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;

    assert!(app.services.conversations.get_conversation_between_users(&[alice]).await.unwrap().is_none());
    assert!(app.services.conversations.get_conversation_between_users(&[alice, alice]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_self_conversation_is_created_once_and_not_starred() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;

    let first = app.services.conversations.get_self_conversation(alice).await.unwrap();
    let second = app.services.conversations.get_self_conversation(alice).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.r#type, ConversationType::SelfConversation);
    assert!(!app.services.favourites.is_favourite(CONVERSATION_FAVOURITES, first.id, alice).await.unwrap());
}

#[tokio::test]
async fn test_self_conversation_can_be_starred_on_creation() {
    let app =
        common::TestApp::spawn_with_messaging(MessagingConfig { self_conversation_favourite: true, ..Default::default() })
            .await;
    let alice = app.create_user("alice").await;

    let conversation = app.services.conversations.get_self_conversation(alice).await.unwrap();
    let again = app.services.conversations.get_self_conversation(alice).await.unwrap();

    assert_eq!(conversation.id, again.id);
    assert!(app.services.favourites.is_favourite(CONVERSATION_FAVOURITES, conversation.id, alice).await.unwrap());
}

#[tokio::test]
async fn test_group_membership_changes() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let conversations = &app.services.conversations;

    let group = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice]).with_name("Project"))
        .await
        .unwrap();
    assert!(group.hash.is_none());

    conversations.add_members_to_conversation(&[bob, carol, alice, i64::MAX], group.id).await.unwrap();
    assert_eq!(conversations.count_conversation_members(group.id).await.unwrap(), 3);
    assert!(conversations.is_user_in_conversation(carol, group.id).await.unwrap());

    conversations.remove_members_from_conversation(&[carol, i64::MAX], group.id).await.unwrap();
    assert_eq!(conversations.count_conversation_members(group.id).await.unwrap(), 2);
    assert!(!conversations.is_user_in_conversation(carol, group.id).await.unwrap());

    let individual = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();
    let result = conversations.add_members_to_conversation(&[carol], individual.id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));

    let result = conversations.remove_members_from_conversation(&[bob], i64::MAX).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_enable_disable_and_rename() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let conversations = &app.services.conversations;

    let group = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice]).with_name("Before"))
        .await
        .unwrap();

    conversations.disable_conversation(group.id).await.unwrap();
    assert!(!conversations.get_conversation(group.id).await.unwrap().enabled);

    conversations.enable_conversation(group.id).await.unwrap();
    conversations.update_conversation_name(group.id, "After").await.unwrap();
    let updated = conversations.get_conversation(group.id).await.unwrap();
    assert!(updated.enabled);
    assert_eq!(updated.name.as_deref(), Some("After"));
    assert!(updated.time_modified >= group.time_modified);

    assert!(matches!(conversations.disable_conversation(i64::MAX).await, Err(AppError::NotFound)));
    assert!(matches!(conversations.update_conversation_name(i64::MAX, "x").await, Err(AppError::NotFound)));
    assert!(matches!(conversations.get_conversation(i64::MAX).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_conversation_by_area() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let course = app.create_course().await;
    let group_id = app.create_course_group(course, None).await;
    let area = ConversationArea::new("core_group", "groups", group_id, course);
    let conversations = &app.services.conversations;

    assert!(conversations.get_conversation_by_area(&area).await.unwrap().is_none());
    assert!(!conversations.is_conversation_area_enabled(&area).await.unwrap());

    let linked = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice]).with_area(area.clone()))
        .await
        .unwrap();

    assert_eq!(conversations.get_conversation_by_area(&area).await.unwrap().map(|c| c.id), Some(linked.id));
    assert!(conversations.is_conversation_area_enabled(&area).await.unwrap());

    conversations.disable_conversation(linked.id).await.unwrap();
    assert!(!conversations.is_conversation_area_enabled(&area).await.unwrap());
}

#[tokio::test]
async fn test_favourite_rules() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let outsider = app.create_user("outsider").await;
    let conversations = &app.services.conversations;

    let conversation = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();

    let first = conversations.set_favourite_conversation(conversation.id, alice).await.unwrap();
    let again = conversations.set_favourite_conversation(conversation.id, alice).await.unwrap();
    assert_eq!(first.id, again.id);

    let denied = conversations.set_favourite_conversation(conversation.id, outsider).await;
    assert!(matches!(denied, Err(AppError::PermissionDenied(_))));
    let missing = conversations.set_favourite_conversation(i64::MAX, alice).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    conversations.unset_favourite_conversation(conversation.id, alice).await.unwrap();
    let unset_again = conversations.unset_favourite_conversation(conversation.id, alice).await;
    assert!(matches!(unset_again, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_mute_is_idempotent() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let outsider = app.create_user("outsider").await;
    let conversations = &app.services.conversations;

    let conversation = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();

    let first = conversations.mute_conversation(alice, conversation.id).await.unwrap();
    let second = conversations.mute_conversation(alice, conversation.id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(conversations.is_conversation_muted(alice, conversation.id).await.unwrap());
    assert!(!conversations.is_conversation_muted(bob, conversation.id).await.unwrap());

    let denied = conversations.mute_conversation(outsider, conversation.id).await;
    assert!(matches!(denied, Err(AppError::PermissionDenied(_))));

    conversations.unmute_conversation(alice, conversation.id).await.unwrap();
    assert!(!conversations.is_conversation_muted(alice, conversation.id).await.unwrap());
    let not_muted = conversations.unmute_conversation(alice, conversation.id).await;
    assert!(matches!(not_muted, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_groups_between_users() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let conversations = &app.services.conversations;

    let shared = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice, bob]).with_name("Shared"))
        .await
        .unwrap();
    let newer = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice, bob, carol]).with_name("Newer"))
        .await
        .unwrap();
    conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice, carol]).with_name("Other"))
        .await
        .unwrap();
    let disabled = conversations
        .create_conversation(
            NewConversation::new(ConversationType::Group, vec![alice, bob]).with_name("Off").with_enabled(false),
        )
        .await
        .unwrap();

    let found = conversations.get_conversations_between_users(alice, bob, 0, 0).await.unwrap();
    let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![newer.id, shared.id]);
    assert!(!ids.contains(&disabled.id));

    let page = conversations.get_conversations_between_users(alice, bob, 1, 1).await.unwrap();
    assert_eq!(page.iter().map(|c| c.id).collect::<Vec<_>>(), vec![shared.id]);
}

#[tokio::test]
async fn test_delete_all_conversation_data_cascades() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let conversations = &app.services.conversations;

    let group = conversations
        .create_conversation(NewConversation::new(ConversationType::Group, vec![alice, bob]).with_name("Doomed"))
        .await
        .unwrap();
    let message = app
        .services
        .messages
        .send_message_to_conversation(alice, group.id, "bye", MessageFormat::Plain)
        .await
        .unwrap();
    app.services.messages.mark_message_as_read(bob, &message, None).await.unwrap();
    conversations.mute_conversation(bob, group.id).await.unwrap();
    conversations.set_favourite_conversation(group.id, alice).await.unwrap();

    conversations.delete_all_conversation_data(group.id).await.unwrap();

    assert!(matches!(conversations.get_conversation(group.id).await, Err(AppError::NotFound)));
    assert_eq!(app.count_rows("message_conversation_members", "conversation_id", group.id).await, 0);
    assert_eq!(app.count_rows("message_conversation_actions", "conversation_id", group.id).await, 0);
    assert_eq!(app.count_rows("messages", "conversation_id", group.id).await, 0);
    assert_eq!(app.count_rows("message_user_actions", "message_id", message.id).await, 0);
    assert!(!app.services.favourites.is_favourite(CONVERSATION_FAVOURITES, group.id, alice).await.unwrap());

    // Deleting again is a no-op.
    conversations.delete_all_conversation_data(group.id).await.unwrap();
}

#[tokio::test]
async fn test_delete_conversation_for_one_user() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    app.enrol_together(&[alice, bob]).await;
    let conversations = &app.services.conversations;
    let messages = &app.services.messages;

    let conversation = conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();
    messages.send_message_to_conversation(alice, conversation.id, "one", MessageFormat::Plain).await.unwrap();
    messages.send_message_to_conversation(bob, conversation.id, "two", MessageFormat::Plain).await.unwrap();

    assert!(conversations.can_delete_conversation(alice, conversation.id).await.unwrap());
    conversations.delete_conversation_by_id(alice, conversation.id).await.unwrap();

    assert!(messages.get_most_recent_conversation_message(conversation.id, alice).await.unwrap().is_none());
    let bob_view = messages.get_most_recent_conversation_message(conversation.id, bob).await.unwrap();
    assert_eq!(bob_view.map(|m| m.full_message), Some("two".to_string()));
}

#[tokio::test]
async fn test_can_delete_conversation_requires_membership_or_capability() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let admin = app.create_user("admin").await;
    let outsider = app.create_user("outsider").await;
    app.grant(admin, Capability::DeleteAnyMessage, None, true).await;

    let conversation = app
        .services
        .conversations
        .create_conversation(NewConversation::new(ConversationType::Individual, vec![alice, bob]))
        .await
        .unwrap();

    assert!(app.services.conversations.can_delete_conversation(admin, conversation.id).await.unwrap());
    assert!(!app.services.conversations.can_delete_conversation(outsider, conversation.id).await.unwrap());
}
