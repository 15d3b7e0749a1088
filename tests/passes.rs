mod common;

use eqr::db::Store;
use eqr::models::Member;
use eqr::pass::PassPayload;
use eqr::{Actor, EqrError};
use time::macros::{date, time};
use time::OffsetDateTime;

use common::{mock_event, mock_members, mock_tracker};

#[tokio::test]
async fn issued_passes_decode_to_the_member_and_event() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;

    let pass = tracker
        .issue_pass(&members[0].member_id, event.id)
        .await
        .unwrap();
    let payload = tracker.codec().decode(&pass.encrypted_data).unwrap();

    assert_eq!(payload.member_id, members[0].member_id);
    assert_eq!(payload.event_id, event.id);
    assert_eq!(payload.event_name, "General Assembly");
    assert_eq!(payload.event_start_time, Some(time!(9:00)));
    assert!(tracker
        .codec()
        .verify(&pass.encrypted_data, event.id, &members[0].member_id));
}

#[tokio::test]
async fn issuing_twice_keeps_one_pass() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;
    let member_id = &members[0].member_id;

    let first = tracker.issue_pass(member_id, event.id).await.unwrap();
    let second = tracker.issue_pass(member_id, event.id).await.unwrap();

    let stored = tracker.store().passes_for_event(event.id).await.unwrap();
    assert_eq!(stored, vec![second.clone()]);
    assert_eq!(second.created_at, first.created_at);
    assert_ne!(second.encrypted_data, first.encrypted_data);
}

#[tokio::test]
async fn get_or_issue_returns_the_existing_pass() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;
    let member_id = &members[0].member_id;

    let issued = tracker.get_or_issue_pass(member_id, event.id).await.unwrap();
    let fetched = tracker.get_or_issue_pass(member_id, event.id).await.unwrap();

    assert_eq!(fetched, issued);
}

#[tokio::test]
async fn issuing_for_unknown_records_is_not_found() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;

    let missing_member = tracker.issue_pass("20239999999", event.id).await;
    assert!(matches!(missing_member, Err(EqrError::NotFound("member"))));

    let missing_event = tracker.issue_pass(&members[0].member_id, event.id + 1).await;
    assert!(matches!(missing_event, Err(EqrError::NotFound("event"))));
}

#[tokio::test]
async fn unencodable_pass_is_not_stored() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let mut members = mock_members(&tracker, 1).await;
    members[0].member_id = String::new();

    let issued = tracker.bulk_issue_passes(event.id, &members).await.unwrap();

    assert_eq!(issued, 0);
    assert!(tracker
        .store()
        .passes_for_event(event.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn bulk_issue_skips_failures_and_counts_the_rest() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let mut members = mock_members(&tracker, 9).await;
    members.insert(
        4,
        Member {
            member_id: String::new(),
            first_name: String::from("Nobody"),
            last_name: String::from("Mock"),
            email: None,
            section: None,
            date_created: OffsetDateTime::now_utc(),
        },
    );
    assert_eq!(members.len(), 10);

    let issued = tracker.bulk_issue_passes(event.id, &members).await.unwrap();

    assert_eq!(issued, 9);
    assert_eq!(
        tracker.store().passes_for_event(event.id).await.unwrap().len(),
        9
    );
}

#[tokio::test]
async fn staff_generate_passes_for_every_member() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 3).await;

    let denied = tracker
        .generate_event_passes(&Actor::Member(members[0].member_id.clone()), event.id)
        .await;
    assert!(matches!(denied, Err(EqrError::Forbidden(_))));

    let issued = tracker
        .generate_event_passes(&Actor::Staff, event.id)
        .await
        .unwrap();
    assert_eq!(issued, 3);
}

#[tokio::test]
async fn dashboard_pass_is_for_members_only() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;
    let actor = Actor::Member(members[0].member_id.clone());

    let staff = tracker.dashboard_pass(&Actor::Staff, event.id).await;
    assert!(matches!(staff, Err(EqrError::Forbidden(_))));

    let first = tracker.dashboard_pass(&actor, event.id).await.unwrap();
    let second = tracker.dashboard_pass(&actor, event.id).await.unwrap();
    assert_eq!(first.member_id, members[0].member_id);
    assert_eq!(first, second);
}

#[tokio::test]
async fn rescheduling_an_event_clears_its_passes() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 2).await;
    tracker
        .generate_event_passes(&Actor::Staff, event.id)
        .await
        .unwrap();
    let scanned = tracker
        .get_or_issue_pass(&members[0].member_id, event.id)
        .await
        .unwrap();
    tracker
        .ingest_scan(event.id, &scanned.encrypted_data)
        .await
        .unwrap();

    // unchanged details leave passes alone
    tracker
        .update_event(event.id, common::mock_new_event())
        .await
        .unwrap();
    assert_eq!(
        tracker.store().passes_for_event(event.id).await.unwrap().len(),
        2
    );

    let mut rescheduled = common::mock_new_event();
    rescheduled.start_time = Some(time!(10:00));
    let updated = tracker.update_event(event.id, rescheduled).await.unwrap();

    assert_eq!(updated.start_time, Some(time!(10:00)));
    assert!(tracker
        .store()
        .passes_for_event(event.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        tracker.store().attendance_for_event(event.id).await.unwrap().len(),
        1
    );

    // reissued passes carry the new schedule
    let reissued = tracker
        .get_or_issue_pass(&members[0].member_id, event.id)
        .await
        .unwrap();
    let payload = tracker.codec().decode(&reissued.encrypted_data).unwrap();
    assert_eq!(payload.event_start_time, Some(time!(10:00)));
}

#[tokio::test]
async fn invalid_event_edits_are_rejected() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;

    let mut backwards = common::mock_new_event();
    backwards.end_time = Some(time!(8:00));
    let result = tracker.update_event(event.id, backwards).await;
    assert!(matches!(result, Err(EqrError::BadRequest(_))));

    let result = tracker
        .update_event(event.id + 1, common::mock_new_event())
        .await;
    assert!(matches!(result, Err(EqrError::NotFound("event"))));
}

#[tokio::test]
async fn passes_round_trip_events_edited_with_seconds() {
    let tracker = mock_tracker();
    let event = mock_event(&tracker).await;
    let members = mock_members(&tracker, 1).await;

    let mut edited = common::mock_new_event();
    edited.start_time = Some(time!(9:30:45));
    edited.end_time = Some(time!(10:59:59.5));
    let updated = tracker.update_event(event.id, edited).await.unwrap();
    assert_eq!(updated.start_time, Some(time!(9:30)));
    assert_eq!(updated.end_time, Some(time!(10:59)));

    let pass = tracker
        .issue_pass(&members[0].member_id, event.id)
        .await
        .unwrap();
    let payload = tracker.codec().decode(&pass.encrypted_data).unwrap();
    assert_eq!(
        payload,
        PassPayload::new(&members[0], &updated, payload.timestamp)
    );

    let mut created = common::mock_new_event();
    created.date = date!(2099 - 01 - 01);
    created.start_time = Some(time!(8:15:30));
    let added = tracker.add_event(created).await.unwrap();
    assert_eq!(added.start_time, Some(time!(8:15)));
}
