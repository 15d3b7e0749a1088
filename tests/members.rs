mod common;

use eqr::db::Store;
use eqr::models::AttendanceStatus;
use eqr::EqrError;

use common::{mock_event, mock_members, mock_new_member, mock_tracker};

#[tokio::test]
async fn members_can_be_edited() {
    let tracker = mock_tracker();
    let members = mock_members(&tracker, 1).await;

    let mut edit = mock_new_member(1);
    edit.first_name = String::from("  Renamed ");
    edit.email = Some(String::from("renamed@example.com"));
    edit.section = Some(String::from("   "));
    let updated = tracker
        .update_member(&members[0].member_id, edit)
        .await
        .unwrap();

    assert_eq!(updated.first_name, "Renamed");
    assert_eq!(updated.email.as_deref(), Some("renamed@example.com"));
    assert_eq!(updated.section, None);
    assert_eq!(updated.date_created, members[0].date_created);
}

#[tokio::test]
async fn edits_cannot_take_another_members_email() {
    let tracker = mock_tracker();
    let members = mock_members(&tracker, 2).await;

    let mut edit = mock_new_member(2);
    edit.email = members[0].email.clone();
    let result = tracker.update_member(&members[1].member_id, edit).await;
    assert!(matches!(result, Err(EqrError::Conflict(_))));

    let untouched = tracker
        .store()
        .member(&members[1].member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched, members[1]);
}

#[tokio::test]
async fn invalid_member_edits_are_rejected() {
    let tracker = mock_tracker();
    let members = mock_members(&tracker, 1).await;

    let moved = tracker
        .update_member(&members[0].member_id, mock_new_member(2))
        .await;
    assert!(matches!(moved, Err(EqrError::BadRequest(_))));

    let mut bad_email = mock_new_member(1);
    bad_email.email = Some(String::from("not-an-email"));
    let result = tracker.update_member(&members[0].member_id, bad_email).await;
    assert!(matches!(result, Err(EqrError::BadRequest(_))));

    let missing = tracker
        .update_member("20230000009", mock_new_member(9))
        .await;
    assert!(matches!(missing, Err(EqrError::NotFound("member"))));
}

#[tokio::test]
async fn selected_members_are_removed_together() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 3).await;
    tracker
        .record_status(event.id, &members[0].member_id, Some(AttendanceStatus::Present))
        .await
        .unwrap();

    let selected = vec![
        members[0].member_id.clone(),
        members[2].member_id.clone(),
        String::from("20239999999"),
    ];
    let removed = tracker.remove_members(&selected).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(tracker.store().members().await.unwrap(), vec![members[1].clone()]);
    assert!(tracker
        .store()
        .attendance_for_event(event.id)
        .await
        .unwrap()
        .is_empty());

    let nothing = tracker.remove_members(&[]).await;
    assert!(matches!(nothing, Err(EqrError::BadRequest(_))));
}
