use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use planetarium::{app, config::Config, AppState};

const ADMIN: (&str, &str) = ("admin@example.com", "admin-password");
const ALICE: (&str, &str) = ("alice@example.com", "alice-password");
const BOB: (&str, &str) = ("bob@example.com", "bob-password");

async fn test_app() -> Router {
    let mut config = Config::in_memory();
    config.auth.admin_email = Some(ADMIN.0.to_string());
    config.auth.admin_password = Some(ADMIN.1.to_string());
    let state = AppState::new(config).await.unwrap();
    app(state)
}

fn basic((email, password): (&str, &str)) -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{email}:{password}"))
    )
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    who: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(who) = who {
        builder = builder.header(header::AUTHORIZATION, basic(who));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, (email, password): (&str, &str)) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

/// Creates a show, a `rows` x `seats` dome and one session; returns the session id.
async fn schedule(app: &Router, rows: i32, seats: i32) -> i64 {
    let (_, show) = send(
        app,
        Method::POST,
        "/api/astronomy-shows",
        Some(ADMIN),
        Some(json!({ "title": "Black Holes", "description": "Event horizons" })),
    )
    .await;
    let (_, dome) = send(
        app,
        Method::POST,
        "/api/planetarium-domes",
        Some(ADMIN),
        Some(json!({ "name": "Blue", "rows": rows, "seats_in_row": seats })),
    )
    .await;
    let (status, session) = send(
        app,
        Method::POST,
        "/api/show-sessions",
        Some(ADMIN),
        Some(json!({
            "astronomy_show": show["id"],
            "planetarium_dome": dome["id"],
            "show_time": "2026-11-01T19:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{session}");
    session["id"].as_i64().unwrap()
}

async fn book(app: &Router, who: (&str, &str), session: i64, row: i32, seat: i32) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/tickets",
        Some(who),
        Some(json!({ "row": row, "seat": seat, "show_session": session })),
    )
    .await
}

#[tokio::test]
async fn banner_and_health_are_public() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(Request::get("/api/show-themes").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let (status, _) = send(&app, Method::GET, "/api/tickets", Some(("admin@example.com", "wrong")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let app = test_app().await;
    register(&app, ALICE).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": ALICE.0, "password": "another-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": "not-an-email", "password": "long-enough" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": "carol@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_writes_require_staff() {
    let app = test_app().await;
    register(&app, ALICE).await;

    let (status, theme) = send(
        &app,
        Method::POST,
        "/api/show-themes",
        Some(ADMIN),
        Some(json!({ "name": "Galaxies" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = theme["id"].as_i64().unwrap();

    let (status, themes) = send(&app, Method::GET, "/api/show-themes", Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(themes.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/show-themes",
        Some(ALICE),
        Some(json!({ "name": "Comets" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Permission is checked before the body is looked at
    let (status, _) = send(&app, Method::POST, "/api/planetarium-domes", Some(ALICE), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/show-themes/{id}");
    let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, renamed) = send(&app, Method::PUT, &uri, Some(ADMIN), Some(json!({ "name": "Nebulae" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Nebulae");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_catalog_bodies_are_rejected() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/planetarium-domes",
        Some(ADMIN),
        Some(json!({ "name": "Empty", "rows": 0, "seats_in_row": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/show-sessions",
        Some(ADMIN),
        Some(json!({
            "astronomy_show": 999,
            "planetarium_dome": 999,
            "show_time": "2026-11-01T19:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/show-themes", Some(ADMIN), Some(json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shows_filter_by_any_listed_theme() {
    let app = test_app().await;
    let mut theme_ids = Vec::new();
    for name in ["Planets", "Stars", "Galaxies"] {
        let (_, theme) = send(&app, Method::POST, "/api/show-themes", Some(ADMIN), Some(json!({ "name": name }))).await;
        theme_ids.push(theme["id"].as_i64().unwrap());
    }
    let (planets, stars, galaxies) = (theme_ids[0], theme_ids[1], theme_ids[2]);

    for (title, themes) in [
        ("Solar System", vec![planets]),
        ("Stellar Nurseries", vec![stars, galaxies]),
        ("Deep Field", vec![galaxies]),
    ] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/astronomy-shows",
            Some(ADMIN),
            Some(json!({ "title": title, "show_themes": themes })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let titles = |shows: &Value| {
        let mut titles: Vec<String> = shows
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["title"].as_str().unwrap().to_string())
            .collect();
        titles.sort();
        titles
    };

    let (_, all) = send(&app, Method::GET, "/api/astronomy-shows", Some(ADMIN), None).await;
    assert_eq!(titles(&all).len(), 3);

    let uri = format!("/api/astronomy-shows?show_theme={planets},%20{stars}");
    let (status, filtered) = send(&app, Method::GET, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&filtered), vec!["Solar System", "Stellar Nurseries"]);

    let (status, _) = send(&app, Method::GET, "/api/astronomy-shows?show_theme=1,x", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ticket_bounds_are_reported() {
    let app = test_app().await;
    register(&app, ALICE).await;
    let session = schedule(&app, 3, 3).await;

    for (row, seat) in [(4, 1), (1, 4), (0, 1), (1, 0), (-1, 2), (2, -5)] {
        let (status, body) = book(&app, ALICE, session, row, seat).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "({row}, {seat})");
        assert!(body["error"].is_string());
    }

    let (_, body) = book(&app, ALICE, session, 1, 1000).await;
    assert_eq!(body["error"], "seat must be in range [1, 3], got 1000");

    let (status, _) = book(&app, ALICE, 9999, 1, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/tickets", Some(ALICE), Some(json!({ "row": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn booking_and_cancellation_scenario() {
    let app = test_app().await;
    register(&app, ALICE).await;
    register(&app, BOB).await;
    let session = schedule(&app, 3, 3).await;

    let (status, ticket) = book(&app, ALICE, session, 2, 3).await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    assert_eq!(ticket["row"], 2);
    assert_eq!(ticket["seat"], 3);
    assert_eq!(ticket["show_session"]["id"], session);
    assert_eq!(ticket["show_session"]["astronomy_show"], "Black Holes");
    assert_eq!(ticket["show_session"]["planetarium_dome"], "Blue");
    assert_eq!(ticket["reservation"]["user"], ALICE.0);
    let ticket_id = ticket["id"].as_i64().unwrap();
    let reservation_id = ticket["reservation"]["id"].as_i64().unwrap();

    let (status, body) = book(&app, BOB, session, 2, 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already taken"));

    let uri = format!("/api/tickets/{ticket_id}");
    let (status, _) = send(&app, Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bob cannot see Alice's ticket or reservation
    let (status, _) = send(&app, Method::GET, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, bobs) = send(&app, Method::GET, "/api/reservations", Some(BOB), None).await;
    assert!(bobs.as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let reservation_uri = format!("/api/reservations/{reservation_id}");
    let (status, _) = send(&app, Method::GET, &reservation_uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = book(&app, BOB, session, 2, 3).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn tickets_can_join_an_existing_reservation() {
    let app = test_app().await;
    register(&app, ALICE).await;
    register(&app, BOB).await;
    let session = schedule(&app, 2, 2).await;

    let (_, first) = book(&app, ALICE, session, 1, 1).await;
    let reservation_id = first["reservation"]["id"].as_i64().unwrap();

    let (status, second) = send(
        &app,
        Method::POST,
        "/api/tickets",
        Some(ALICE),
        Some(json!({ "row": 1, "seat": 2, "show_session": session, "reservation": reservation_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["reservation"]["id"], reservation_id);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/tickets",
        Some(BOB),
        Some(json!({ "row": 2, "seat": 1, "show_session": session, "reservation": reservation_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Cancelling one of two tickets keeps the reservation
    let uri = format!("/api/tickets/{}", first["id"]);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, reservation) = send(
        &app,
        Method::GET,
        &format!("/api/reservations/{reservation_id}"),
        Some(ALICE),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reservation["user"], ALICE.0);

    let (_, tickets) = send(&app, Method::GET, "/api/tickets", Some(ALICE), None).await;
    assert_eq!(tickets.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn staff_can_cancel_any_ticket() {
    let app = test_app().await;
    register(&app, ALICE).await;
    let session = schedule(&app, 2, 2).await;

    let (_, ticket) = book(&app, ALICE, session, 2, 2).await;
    let (_, all) = send(&app, Method::GET, "/api/tickets", Some(ADMIN), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let uri = format!("/api/tickets/{}", ticket["id"]);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, reservations) = send(&app, Method::GET, "/api/reservations", Some(ADMIN), None).await;
    assert!(reservations.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_session_cascades_to_tickets_and_reservations() {
    let app = test_app().await;
    register(&app, ALICE).await;
    let session = schedule(&app, 3, 3).await;
    let other = schedule(&app, 3, 3).await;

    let (_, kept) = book(&app, ALICE, other, 1, 1).await;
    book(&app, ALICE, session, 1, 1).await;
    book(&app, ALICE, session, 1, 2).await;

    let (status, detail) = send(&app, Method::GET, &format!("/api/show-sessions/{session}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["planetarium_dome"]["rows"], 3);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/show-sessions/{session}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, tickets) = send(&app, Method::GET, "/api/tickets", Some(ALICE), None).await;
    let tickets = tickets.as_array().unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["id"], kept["id"]);

    let (_, reservations) = send(&app, Method::GET, "/api/reservations", Some(ALICE), None).await;
    assert_eq!(reservations.as_array().unwrap().len(), 1);

    let (_, sessions) = send(&app, Method::GET, "/api/show-sessions", Some(ALICE), None).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
}

async fn create(app: &Router, uri: &str, body: Value) -> i64 {
    let (status, created) = send(app, Method::POST, uri, Some(ADMIN), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["id"].as_i64().unwrap()
}

async fn create_session(app: &Router, show: i64, dome: i64) -> i64 {
    create(
        app,
        "/api/show-sessions",
        json!({ "astronomy_show": show, "planetarium_dome": dome, "show_time": "2026-12-01T20:00:00Z" }),
    )
    .await
}

/// Alice books one seat in each session under a single reservation; Bob books
/// only in `doomed`. Returns Alice's reservation id.
async fn book_across(app: &Router, doomed: i64, kept: i64) -> i64 {
    let (status, first) = book(app, ALICE, doomed, 1, 1).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let reservation_id = first["reservation"]["id"].as_i64().unwrap();

    let (status, _) = send(
        app,
        Method::POST,
        "/api/tickets",
        Some(ALICE),
        Some(json!({ "row": 1, "seat": 1, "show_session": kept, "reservation": reservation_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = book(app, BOB, doomed, 2, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    reservation_id
}

async fn assert_cascade(app: &Router, reservation_id: i64, kept_session: i64) {
    let (status, _) = send(app, Method::GET, &format!("/api/reservations/{reservation_id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, tickets) = send(app, Method::GET, "/api/tickets", Some(ALICE), None).await;
    let tickets = tickets.as_array().unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["show_session"]["id"], kept_session);
    assert_eq!(tickets[0]["reservation"]["id"], reservation_id);

    let (_, bobs_reservations) = send(app, Method::GET, "/api/reservations", Some(BOB), None).await;
    assert!(bobs_reservations.as_array().unwrap().is_empty());
    let (_, bobs_tickets) = send(app, Method::GET, "/api/tickets", Some(BOB), None).await;
    assert!(bobs_tickets.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_show_cascades_through_its_sessions() {
    let app = test_app().await;
    register(&app, ALICE).await;
    register(&app, BOB).await;

    let doomed_show = create(&app, "/api/astronomy-shows", json!({ "title": "Pluto" })).await;
    let kept_show = create(&app, "/api/astronomy-shows", json!({ "title": "Saturn" })).await;
    let dome = create(&app, "/api/planetarium-domes", json!({ "name": "Main", "rows": 3, "seats_in_row": 3 })).await;
    let doomed = create_session(&app, doomed_show, dome).await;
    let kept = create_session(&app, kept_show, dome).await;
    let reservation_id = book_across(&app, doomed, kept).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/astronomy-shows/{doomed_show}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/show-sessions/{doomed}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_cascade(&app, reservation_id, kept).await;
}

#[tokio::test]
async fn deleting_a_dome_cascades_through_its_sessions() {
    let app = test_app().await;
    register(&app, ALICE).await;
    register(&app, BOB).await;

    let show = create(&app, "/api/astronomy-shows", json!({ "title": "Andromeda" })).await;
    let doomed_dome = create(&app, "/api/planetarium-domes", json!({ "name": "Old", "rows": 3, "seats_in_row": 3 })).await;
    let kept_dome = create(&app, "/api/planetarium-domes", json!({ "name": "New", "rows": 3, "seats_in_row": 3 })).await;
    let doomed = create_session(&app, show, doomed_dome).await;
    let kept = create_session(&app, show, kept_dome).await;
    let reservation_id = book_across(&app, doomed, kept).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/planetarium-domes/{doomed_dome}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, sessions) = send(&app, Method::GET, "/api/show-sessions", Some(ADMIN), None).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], kept);
    assert_cascade(&app, reservation_id, kept).await;
}

#[tokio::test]
async fn non_numeric_ids_get_a_json_error() {
    let app = test_app().await;
    register(&app, ALICE).await;

    for uri in ["/api/tickets/abc", "/api/astronomy-shows/1.5", "/api/reservations/x"] {
        let (status, body) = send(&app, Method::GET, uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri} gave {body}");
    }

    let (status, body) = send(&app, Method::DELETE, "/api/tickets/none", Some(ALICE), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
