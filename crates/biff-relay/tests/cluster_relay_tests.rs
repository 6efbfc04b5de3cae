// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Integration tests for the JetStream backend.
//!
//! These need a live NATS server with JetStream enabled and are skipped
//! unless `BIFF_TEST_NATS_URL` is set:
//!
//! ```text
//! nats-server -js &
//! BIFF_TEST_NATS_URL=nats://127.0.0.1:4222 cargo test -p biff-relay
//! ```
//!
//! Optional auth for the test server comes from `BIFF_TEST_NATS_TOKEN`,
//! `BIFF_TEST_NATS_NKEYS_SEED` or `BIFF_TEST_NATS_CREDS`.  Each test uses a
//! unique repo name so runs never share stream state.

use biff_config::RelayAuth;
use biff_model::{Address, Identity, Message, SessionEvent, SessionKey, UserSession};
use biff_relay::{ClusterRelay, Relay};

fn test_url() -> Option<String> {
    std::env::var("BIFF_TEST_NATS_URL").ok()
}

fn test_auth() -> RelayAuth {
    if let Ok(t) = std::env::var("BIFF_TEST_NATS_TOKEN") {
        return RelayAuth::Token(t);
    }
    if let Ok(p) = std::env::var("BIFF_TEST_NATS_NKEYS_SEED") {
        return RelayAuth::NkeysSeed(p);
    }
    if let Ok(p) = std::env::var("BIFF_TEST_NATS_CREDS") {
        return RelayAuth::Credentials(p);
    }
    RelayAuth::None
}

/// Fresh repo name per test so stream/KV state never leaks between tests.
fn unique_repo(tag: &str) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("bifftest-{tag}-{}", &nonce[..8])
}

async fn connect(repo: &str, login: &str) -> Option<ClusterRelay> {
    let url = test_url()?;
    Some(
        ClusterRelay::connect(&url, test_auth(), repo, login)
            .await
            .expect("connecting to test NATS server"),
    )
}

fn session(login: &str, tty: &str) -> UserSession {
    UserSession::start(
        &Identity {
            login: login.into(),
            display_name: login.to_uppercase(),
        },
        SessionKey::new(login, tty),
        "devbox".into(),
        "/work".into(),
    )
}

fn msg(to: &str, body: &str) -> Message {
    Message::new(
        SessionKey::new("eric", "cc001122"),
        to.parse::<Address>().unwrap(),
        body,
    )
}

#[tokio::test]
async fn session_round_trip_through_kv() {
    let repo = unique_repo("sess");
    let Some(relay) = connect(&repo, "kai").await else {
        return;
    };
    let s = session("kai", "aabb1122");
    relay.put_session(&s).await.unwrap();
    let got = relay.get_session("kai").await.unwrap().unwrap();
    assert_eq!(got.key.tty, "aabb1122");
    relay.close().await.unwrap();
}

#[tokio::test]
async fn targeted_message_pops_exactly_once() {
    let repo = unique_repo("pop");
    let Some(relay) = connect(&repo, "kai").await else {
        return;
    };
    relay.deliver(&msg("kai:aabb1122", "hi")).await.unwrap();

    let first = relay.drain_for("kai", "aabb1122").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].body, "hi");

    let second = relay.drain_for("kai", "aabb1122").await.unwrap();
    assert!(second.is_empty());
    relay.close().await.unwrap();
}

#[tokio::test]
async fn broadcast_consumed_by_one_of_two_processes() {
    let repo = unique_repo("bcast");
    let Some(writer) = connect(&repo, "eric").await else {
        return;
    };
    let reader_a = connect(&repo, "kai").await.unwrap();
    let reader_b = connect(&repo, "kai").await.unwrap();

    writer.deliver(&msg("kai", "standup")).await.unwrap();

    let a = reader_a.drain_for("kai", "aaaa0000").await.unwrap();
    let b = reader_b.drain_for("kai", "bbbb1111").await.unwrap();
    assert_eq!(a.len() + b.len(), 1, "exactly one copy must be delivered");

    writer.close().await.unwrap();
    reader_a.close().await.unwrap();
    reader_b.close().await.unwrap();
}

#[tokio::test]
async fn broadcast_to_offline_user_persists_until_first_read() {
    let repo = unique_repo("offline");
    let Some(writer) = connect(&repo, "eric").await else {
        return;
    };
    // No kai session exists yet.
    writer.deliver(&msg("kai", "standup at 10")).await.unwrap();
    writer.close().await.unwrap();

    // kai's process starts later, on the same bus.
    let reader = connect(&repo, "kai").await.unwrap();
    let got = reader.drain_for("kai", "ffff0001").await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].body, "standup at 10");
    reader.close().await.unwrap();
}

#[tokio::test]
async fn peek_does_not_consume() {
    let repo = unique_repo("peek");
    let Some(relay) = connect(&repo, "kai").await else {
        return;
    };
    relay.deliver(&msg("kai", "a")).await.unwrap();
    relay.deliver(&msg("kai:aabb1122", "b")).await.unwrap();

    assert_eq!(relay.peek_unread_count("kai", "aabb1122").await.unwrap(), 2);
    assert_eq!(relay.peek_unread_count("kai", "aabb1122").await.unwrap(), 2);
    assert_eq!(relay.drain_for("kai", "aabb1122").await.unwrap().len(), 2);
    assert_eq!(relay.peek_unread_count("kai", "aabb1122").await.unwrap(), 0);
    relay.close().await.unwrap();
}

#[tokio::test]
async fn wtmp_events_cross_processes_and_filter_by_login() {
    let repo = unique_repo("wtmp");
    let Some(a) = connect(&repo, "kai").await else {
        return;
    };
    let b = connect(&repo, "eric").await.unwrap();

    a.log_event(&SessionEvent::login(SessionKey::new("kai", "aabb1122"), "devbox"))
        .await
        .unwrap();
    b.log_event(&SessionEvent::login(SessionKey::new("eric", "cc001122"), "laptop"))
        .await
        .unwrap();

    let kai_events = b.recent_events(Some("kai"), 25).await.unwrap();
    assert_eq!(kai_events.len(), 1);
    assert_eq!(kai_events[0].session.login, "kai");

    let all = a.recent_events(None, 25).await.unwrap();
    assert_eq!(all.len(), 2);

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn set_plan_and_mesg_update_kv_entry() {
    let repo = unique_repo("mut");
    let Some(relay) = connect(&repo, "kai").await else {
        return;
    };
    let s = session("kai", "aabb1122");
    relay.put_session(&s).await.unwrap();
    relay.set_plan(&s.key, "fixing auth").await.unwrap();
    relay.set_mesg(&s.key, false).await.unwrap();

    let got = relay.get_session("kai").await.unwrap().unwrap();
    assert_eq!(got.plan, "fixing auth");
    assert!(!got.messages_enabled);
    relay.close().await.unwrap();
}

#[tokio::test]
async fn remove_session_hides_it_from_listing() {
    let repo = unique_repo("rm");
    let Some(relay) = connect(&repo, "kai").await else {
        return;
    };
    let s = session("kai", "aabb1122");
    relay.put_session(&s).await.unwrap();
    relay.remove_session(&s.key).await.unwrap();
    assert!(relay.list_sessions().await.unwrap().is_empty());
    relay.close().await.unwrap();
}
