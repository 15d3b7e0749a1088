#![allow(dead_code)]

use std::sync::Arc;

use eqr::db::{MemoryStore, Store};
use eqr::models::{Event, Member, NewEvent, NewMember};
use eqr::{Config, Tracker};
use time::macros::{date, time};

pub const SECRET: &str = "integration-test-secret";

pub fn mock_config() -> Config {
    Config::with_secret(SECRET)
}

pub fn mock_tracker() -> Tracker<MemoryStore> {
    tracker_with(mock_config())
}

pub fn tracker_with(config: Config) -> Tracker<MemoryStore> {
    Tracker::new(Arc::new(MemoryStore::new()), &config).unwrap()
}

pub fn mock_new_event() -> NewEvent {
    NewEvent {
        name: String::from("General Assembly"),
        date: date!(2026 - 11 - 02),
        start_time: Some(time!(9:00)),
        end_time: Some(time!(11:00)),
    }
}

pub fn mock_new_member(index: usize) -> NewMember {
    NewMember {
        member_id: format!("2023{:07}", index),
        first_name: format!("Member{}", index),
        last_name: String::from("Mock"),
        email: Some(format!("member{}@example.com", index)),
        section: Some(String::from("BSCS1")),
    }
}

/// Stores an event directly, skipping the past-date check so fixtures
/// don't depend on today's date.
pub async fn mock_event(tracker: &Tracker<MemoryStore>) -> Event {
    mock_event_from(tracker, mock_new_event()).await
}

pub async fn mock_event_from(tracker: &Tracker<MemoryStore>, event: NewEvent) -> Event {
    tracker.store().insert_event(&event).await.unwrap()
}

pub async fn mock_members(tracker: &Tracker<MemoryStore>, count: usize) -> Vec<Member> {
    let mut members = Vec::with_capacity(count);
    for index in 1..=count {
        members.push(tracker.add_member(mock_new_member(index)).await.unwrap());
    }

    members
}
