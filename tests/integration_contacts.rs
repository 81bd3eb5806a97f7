use colloquy::domain::notification::DispatchPayload;
use colloquy::error::AppError;

mod common;

#[tokio::test]
async fn test_contact_request_flow() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let contacts = &app.services.contacts;

    let request = contacts.create_contact_request(alice, bob).await.unwrap();
    assert_eq!(request.user_id, alice);
    assert_eq!(request.requested_user_id, bob);

    let notified = app.dispatcher.sent_to(bob);
    assert!(matches!(
        notified.as_slice(),
        [DispatchPayload::ContactRequest { request_id, user_id_from, .. }] if *request_id == request.id && *user_id_from == alice
    ));

    // Asking again returns the pending request without notifying twice.
    let again = contacts.create_contact_request(alice, bob).await.unwrap();
    assert_eq!(again.id, request.id);
    assert_eq!(app.dispatcher.sent_to(bob).len(), 1);

    assert_eq!(contacts.get_received_contact_requests_count(bob).await.unwrap(), 1);
    let received = contacts.get_contact_requests(bob, 0, 0).await.unwrap();
    assert_eq!(received.iter().map(|r| r.id).collect::<Vec<_>>(), vec![request.id]);
    assert!(contacts.does_contact_request_exist(alice, bob).await.unwrap());
    assert!(contacts.does_contact_request_exist(bob, alice).await.unwrap());

    let contact = contacts.confirm_contact_request(alice, bob).await.unwrap();
    assert_eq!(contact.other(alice), bob);
    assert!(contacts.is_contact(alice, bob).await.unwrap());
    assert!(contacts.is_contact(bob, alice).await.unwrap());
    assert!(!contacts.does_contact_request_exist(alice, bob).await.unwrap());

    let already = contacts.create_contact_request(bob, alice).await;
    assert!(matches!(already, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_confirm_without_request_fails() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let result = app.services.contacts.confirm_contact_request(alice, bob).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert!(!app.services.contacts.is_contact(alice, bob).await.unwrap());
}

#[tokio::test]
async fn test_decline_is_silent() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let contacts = &app.services.contacts;

    contacts.create_contact_request(alice, bob).await.unwrap();
    contacts.decline_contact_request(alice, bob).await.unwrap();
    contacts.decline_contact_request(alice, bob).await.unwrap();

    assert!(!contacts.does_contact_request_exist(alice, bob).await.unwrap());
    assert!(!contacts.is_contact(alice, bob).await.unwrap());
    assert_eq!(contacts.get_received_contact_requests_count(bob).await.unwrap(), 0);
}

#[tokio::test]
async fn test_blocked_requester_is_refused() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    app.services.contacts.block_user(bob, alice).await.unwrap();

    let result = app.services.contacts.create_contact_request(alice, bob).await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert!(app.dispatcher.sent().is_empty());

    let to_self = app.services.contacts.create_contact_request(alice, alice).await;
    assert!(matches!(to_self, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_requests_between_users() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let contacts = &app.services.contacts;

    let first = contacts.create_contact_request(alice, bob).await.unwrap();
    let second = contacts.create_contact_request(bob, alice).await.unwrap();

    let between = contacts.get_contact_requests_between_users(bob, alice).await.unwrap();
    assert_eq!(between.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id, second.id]);
}

#[tokio::test]
async fn test_contacts_listing_and_removal() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;
    let contacts = &app.services.contacts;

    contacts.add_contact(alice, bob).await.unwrap();
    let again = contacts.add_contact(bob, alice).await.unwrap();
    contacts.add_contact(carol, alice).await.unwrap();

    assert_eq!(again.other(bob), alice);
    assert_eq!(contacts.count_contacts(alice).await.unwrap(), 2);
    let listed: Vec<i64> = contacts.get_contacts(alice, 0, 0).await.unwrap().iter().map(|u| u.id).collect();
    assert_eq!(listed, vec![bob, carol]);
    assert_eq!(contacts.get_contacts(alice, 1, 1).await.unwrap().iter().map(|u| u.id).collect::<Vec<_>>(), vec![carol]);

    // Either side may remove the contact.
    contacts.remove_contact(bob, alice).await.unwrap();
    contacts.remove_contact(alice, carol).await.unwrap();
    assert_eq!(contacts.count_contacts(alice).await.unwrap(), 0);
    assert!(!contacts.is_contact(carol, alice).await.unwrap());

    let to_self = contacts.add_contact(alice, alice).await;
    assert!(matches!(to_self, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_blocking() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let contacts = &app.services.contacts;

    let first = contacts.block_user(alice, bob).await.unwrap();
    let second = contacts.block_user(alice, bob).await.unwrap();
    assert_eq!(first.id, second.id);

    assert!(contacts.is_blocked(alice, bob).await.unwrap());
    assert!(!contacts.is_blocked(bob, alice).await.unwrap());
    assert_eq!(contacts.get_blocked_users(alice).await.unwrap().iter().map(|b| b.blocked_user_id).collect::<Vec<_>>(), vec![bob]);

    contacts.unblock_user(alice, bob).await.unwrap();
    contacts.unblock_user(alice, bob).await.unwrap();
    assert!(!contacts.is_blocked(alice, bob).await.unwrap());

    let to_self = contacts.block_user(alice, alice).await;
    assert!(matches!(to_self, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_blocked_requests_are_not_counted() {
    let app = common::TestApp::spawn().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let contacts = &app.services.contacts;

    contacts.create_contact_request(alice, bob).await.unwrap();
    contacts.block_user(bob, alice).await.unwrap();

    assert_eq!(contacts.get_received_contact_requests_count(bob).await.unwrap(), 0);
}
