//! Room API integration tests.
//!
//! Drives the Axum router in-process with `tower::ServiceExt::oneshot`
//! against a `RoomHarness` controller that already holds room `R1`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rc_test_utils::{events, RoomHarness, TestParticipant, TestRoom};
use room_coordinator::events::EventAck;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(
    router: Router,
    method: &str,
    uri: &str,
    caller: Option<&TestParticipant>,
    body: Option<String>,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        for (name, value) in caller.headers() {
            builder = builder.header(name, value);
        }
    }
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body)
        }
        None => Body::empty(),
    };

    let response = router.oneshot(builder.body(body)?).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn test_missing_caller_headers_returns_401() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;

    let (status, body) = send(harness.router(), "GET", "/api/v1/rooms/R1", None, None).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CALLER");

    Ok(())
}

#[tokio::test]
async fn test_system_identity_is_not_a_caller() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let system = TestParticipant::instructor("system");

    let (status, _) = send(
        harness.router(),
        "GET",
        "/api/v1/rooms/R1",
        Some(&system),
        None,
    )
    .await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_create_room_returns_201() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let carol = TestParticipant::instructor("carol");

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms",
        Some(&carol),
        Some(json!({"roomId": "R2", "displayName": "Carol"}).to_string()),
    )
    .await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["room"]["roomId"], "R2");
    assert_eq!(body["room"]["state"], "open");
    assert_eq!(body["room"]["owner"], "carol");
    assert_eq!(body["owner"]["identity"], "carol");
    assert_eq!(body["owner"]["role"], "instructor");
    assert_eq!(body["owner"]["canPublish"], true);

    let status = harness.controller.get_status().await?;
    assert_eq!(status.room_count, 2);

    Ok(())
}

#[tokio::test]
async fn test_create_duplicate_room_returns_409() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms",
        Some(&harness.owner),
        Some(json!({"roomId": "R1", "displayName": "Alice"}).to_string()),
    )
    .await?;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    Ok(())
}

#[tokio::test]
async fn test_student_create_room_returns_403() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms",
        Some(&bob),
        Some(json!({"roomId": "R2", "displayName": "Bob"}).to_string()),
    )
    .await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn test_create_room_with_malformed_body_returns_400() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms",
        Some(&harness.owner),
        Some("{\"roomId\":".to_string()),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PAYLOAD");

    Ok(())
}

#[tokio::test]
async fn test_unknown_room_returns_404() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;

    let (status, body) = send(
        harness.router(),
        "GET",
        "/api/v1/rooms/nowhere",
        Some(&harness.owner),
        None,
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ROOM_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_post_join_event_returns_room_view() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/events",
        Some(&bob),
        Some(events::to_json(&events::join("Bob"))),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "joined");
    assert_eq!(body["participant"]["identity"], "bob");
    assert_eq!(body["participant"]["role"], "student");
    assert_eq!(body["participant"]["canPublish"], false);
    assert_eq!(body["participants"].as_array().map(Vec::len), Some(2));

    let (status, body) = send(
        harness.router(),
        "GET",
        "/api/v1/rooms/R1/participants",
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["identity"], "alice");
    assert_eq!(body[1]["identity"], "bob");

    Ok(())
}

#[tokio::test]
async fn test_post_unrecognized_event_returns_400() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;

    for body in [
        "not json".to_string(),
        json!({"type": "teleport"}).to_string(),
        json!({"type": "castVote", "payload": {"pollId": "p"}}).to_string(),
    ] {
        let (status, response) = send(
            harness.router(),
            "POST",
            "/api/v1/rooms/R1/events",
            Some(&harness.owner),
            Some(body),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "INVALID_PAYLOAD");
    }

    Ok(())
}

#[tokio::test]
async fn test_event_from_non_member_returns_403() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/events",
        Some(&bob),
        Some(events::to_json(&events::raise_hand())),
    )
    .await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_A_PARTICIPANT");

    Ok(())
}

#[tokio::test]
async fn test_get_tally_reflects_votes() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");
    harness.join(&bob).await?;

    let EventAck::Poll { poll } = harness
        .dispatch(&harness.owner, events::create_poll("Ready?", &["Yes", "No"]))
        .await?
    else {
        unreachable!("expected poll ack");
    };

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/events",
        Some(&bob),
        Some(events::to_json(&events::cast_vote(&poll.poll_id, 0))),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "tally");

    let uri = format!("/api/v1/rooms/R1/polls/{}/tally", poll.poll_id);
    let (status, body) = send(harness.router(), "GET", &uri, Some(&bob), None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pollId"], poll.poll_id.as_str());
    assert_eq!(body["counts"][0]["option"], "Yes");
    assert_eq!(body["counts"][0]["votes"], 1);
    assert_eq!(body["counts"][1]["votes"], 0);
    assert_eq!(body["totalVotes"], 1);

    let (status, body) = send(
        harness.router(),
        "GET",
        "/api/v1/rooms/R1/polls/missing/tally",
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "POLL_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_transport_reports_need_no_caller() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");
    harness.join(&bob).await?;

    let (status, _) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/transport/seen",
        None,
        Some(json!({"identity": "bob"}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/transport/left",
        None,
        Some(json!({"identity": "bob"}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let participants = harness.room.list_participants().await?;
    assert_eq!(participants.len(), 1);

    // A repeated report is still accepted.
    let (status, _) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/transport/left",
        None,
        Some(json!({"identity": "bob"}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/transport/seen",
        None,
        Some(json!({"identity": "bob"}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PARTICIPANT_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_ended_room_rejects_events_with_410() -> Result<(), anyhow::Error> {
    let harness = RoomHarness::start(TestRoom::new("R1")).await?;
    let bob = TestParticipant::student("bob");
    harness.join(&bob).await?;
    harness.dispatch(&harness.owner, events::end_room()).await?;

    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/events",
        Some(&bob),
        Some(events::to_json(&events::raise_hand())),
    )
    .await?;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "ROOM_CLOSED");

    // Field limits are checked behind the lifecycle gate.
    let (status, body) = send(
        harness.router(),
        "POST",
        "/api/v1/rooms/R1/events",
        Some(&bob),
        Some(json!({"type": "join", "payload": {"displayName": "   "}}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "ROOM_CLOSED");

    let (status, body) = send(
        harness.router(),
        "GET",
        "/api/v1/rooms/R1",
        Some(&bob),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ending");
    assert_eq!(body["endedBy"], "alice");

    Ok(())
}
