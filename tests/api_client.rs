use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use route_viewer::heatmap::{HeatmapPeriod, HeatmapQuery};
use route_viewer::poller::ActiveUsersPoller;
use route_viewer::stations::{MarkerType, StationDraft, StationPhoto};
use route_viewer::stats::LeaderboardPeriod;
use route_viewer::{
    ApiError, ClientConfig, DateRange, GpsPoint, RetryConfig, RouteView, TrackerClient, ViewState,
};

#[derive(Default)]
struct Backend {
    active_users_calls: AtomicUsize,
    active_users_down: AtomicBool,
    likes: AtomicUsize,
    last_upload: std::sync::Mutex<Option<String>>,
}

type Shared = State<Arc<Backend>>;

async fn route(Path(user_id): Path<i64>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match user_id {
        // Two sessions, the first spanning ~1113 m along the equator
        1 => {
            assert_eq!(params.get("startDate").map(String::as_str), Some("2024-06-01"));
            assert_eq!(params.get("endDate").map(String::as_str), Some("2024-06-02"));
            (
                StatusCode::OK,
                Json(json!([
                    {"sessionId": 10, "latitude": 0.0, "longitude": 0.0, "timestamp": 1717200000},
                    {"sessionId": "20", "latitude": 59.93, "longitude": 30.31, "timestamp": 1717200030.5},
                    {"sessionId": 10, "latitude": 0.0, "longitude": 0.01, "timestamp": 1717200060}
                ])),
            )
        }
        2 => (StatusCode::OK, Json(json!([]))),
        3 => (StatusCode::NOT_FOUND, Json(json!({"error": "User not found"}))),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"}))),
    }
}

async fn top_users(Path(period): Path<String>) -> impl IntoResponse {
    if period == "this_week" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No data found for the specified period"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!([
            {"userId": 1, "username": "ann", "distance": 120.5},
            {"userId": 2, "username": "bob", "distance": 80.0}
        ])),
    )
}

async fn top_sessions(Path(_period): Path<String>) -> Json<Value> {
    Json(json!({"topSessions": [
        {"sessionId": "s-1", "userId": 1, "username": "ann", "distance": 42.0, "duration": 95.0}
    ]}))
}

async fn top_daily(Path(_period): Path<String>) -> Json<Value> {
    Json(json!({"topDailyDistances": [
        {"userId": 2, "username": "bob", "date": "2024-06-03", "distance": 61.2}
    ]}))
}

async fn total_distance(Path(_period): Path<String>) -> Json<Value> {
    Json(json!({"totalDistance": 200.5}))
}

async fn comparison(Path(_period): Path<String>) -> Json<Value> {
    Json(json!({
        "northDistance": 150.0, "southDistance": 50.0,
        "percentageInNorth": 75.0, "percentageInSouth": 25.0
    }))
}

async fn monthly_heatmap(Path((year, month)): Path<(i32, u32)>) -> Json<Value> {
    assert_eq!((year, month), (2023, 12));
    Json(json!([
        {"latitude": 59.93, "longitude": 30.31, "intensity": 0.4},
        {"latitude": 59.94, "longitude": 30.32}
    ]))
}

async fn stations() -> Json<Value> {
    Json(json!([
        {"_id": "a1", "latitude": 59.93, "longitude": 30.31, "markerType": "danger",
         "addedBy": {"username": "ann"}, "addedAt": "2024-06-01T08:00:00Z"},
        {"_id": "b2", "latitude": 59.95, "longitude": 30.33, "markerType": "charging", "is24Hours": true}
    ]))
}

async fn create_station(State(backend): Shared, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    *backend.last_upload.lock().unwrap() = Some(String::from_utf8_lossy(&body).into_owned());
    Json(json!({"_id": "new-1", "latitude": 59.9, "longitude": 30.3, "markerType": "chat"}))
}

async fn update_station(Path(id): Path<String>) -> Json<Value> {
    Json(json!({"_id": id, "latitude": 59.9, "longitude": 30.3, "markerType": "interesting",
                "comment": "moved"}))
}

async fn remove_station(Path(id): Path<String>) -> impl IntoResponse {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Station not found"})));
    }
    (StatusCode::OK, Json(json!({"message": "deleted"})))
}

async fn like(State(backend): Shared, Path((_id, _user)): Path<(String, i64)>) -> Json<Value> {
    backend.likes.fetch_add(1, Ordering::SeqCst);
    Json(json!({"ok": true}))
}

async fn like_status(State(backend): Shared, Path((_id, _user)): Path<(String, i64)>) -> Json<Value> {
    let likes = backend.likes.load(Ordering::SeqCst);
    Json(json!({"liked": likes > 0, "disliked": false, "likes": likes, "dislikes": 2}))
}

async fn active_users(State(backend): Shared) -> impl IntoResponse {
    // First two polls fail, then the fleet appears
    let call = backend.active_users_calls.fetch_add(1, Ordering::SeqCst);
    if call < 2 || backend.active_users_down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "warming up"})));
    }
    (
        StatusCode::OK,
        Json(json!([{"userId": 7, "username": "ann", "latitude": 59.93, "longitude": 30.31}])),
    )
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/route/:user_id", get(route))
        .route("/api/top-users/:period", get(top_users))
        .route("/api/top-sessions/:period", get(top_sessions))
        .route("/api/top-daily-distances/:period", get(top_daily))
        .route("/api/total-distance/:period", get(total_distance))
        .route("/api/total-category-by-distance/:period", get(comparison))
        .route("/api/monthly-heatmap/:year/:month", get(monthly_heatmap))
        .route("/api/charging-stations", get(stations).post(create_station))
        .route("/api/charging-stations/:id", put(update_station).delete(remove_station))
        .route("/api/charging-stations/:id/like/:user_id", post(like))
        .route("/api/charging-stations/:id/like-status/:user_id", get(like_status))
        .route("/api/active-users", get(active_users))
        .with_state(Arc::clone(&backend));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test backend");
    });

    (format!("http://{}/api", addr), backend)
}

fn client(base_url: &str) -> TrackerClient {
    let mut config = ClientConfig::with_base_url(base_url);
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        max_retries: 3,
    };
    TrackerClient::new(config).expect("client")
}

fn june_range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_route_view_ready() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);
    let mut view = RouteView::new();

    assert!(client.load_route_view(&mut view, 1, june_range()).await);
    assert_eq!(view.state(), &ViewState::Ready);

    let summary = view.summary();
    assert_eq!(summary.groups.get(&"20".into()).unwrap()[0].timestamp, 1717200030);
    let keys: Vec<&str> = summary.groups.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["10", "20"]);
    let first = summary.distances.get(&"10".into()).unwrap();
    assert!((first - 1113.2).abs() < 2.0);
    assert_eq!(summary.distances.get(&"20".into()), Some(0.0));
    assert!((view.active_distance() - first).abs() < 1e-9);

    assert!(view.toggle(&"10".into()));
    assert_eq!(view.active_distance(), 0.0);
}

#[tokio::test]
async fn test_empty_route_shows_message() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);
    let mut view = RouteView::new();

    assert!(client.load_route_view(&mut view, 2, june_range()).await);
    assert!(matches!(view.state(), ViewState::Empty(_)));
    assert!(view.summary().is_empty());
    assert_eq!(view.active_distance(), 0.0);
}

#[tokio::test]
async fn test_error_bodies() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);

    let err = client.fetch_route(3, None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message(), "User not found");

    let err = client.fetch_route(4, None).await.unwrap_err();
    assert_eq!(err.user_message(), "HTTP error, status 500");

    let mut view = RouteView::new();
    client.load_route_view(&mut view, 3, june_range()).await;
    assert_eq!(view.message(), Some("User not found"));
    assert!(view.summary().is_empty());
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);
    let mut view = RouteView::new();

    let stale = view.submit(june_range());
    assert!(client.load_route_view(&mut view, 2, june_range()).await);
    assert!(matches!(view.state(), ViewState::Empty(_)));

    let late = client.fetch_route(1, Some(&june_range())).await;
    assert!(!view.complete(stale, late));
    assert!(matches!(view.state(), ViewState::Empty(_)));
}

#[tokio::test]
async fn test_leaderboards() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);

    let boards = client.fetch_leaderboards(LeaderboardPeriod::LastWeek).await.unwrap();
    assert_eq!(boards.top_users.len(), 2);
    assert_eq!(boards.top_sessions[0].session_id.as_str(), "s-1");
    assert_eq!(boards.top_daily_distances[0].date, "2024-06-03");
    assert_eq!(boards.total_distance, 200.5);
    assert_eq!(boards.comparison.unwrap().percentage_in_north, 75.0);

    let err = client.fetch_leaderboards(LeaderboardPeriod::ThisWeek).await.unwrap_err();
    assert!(err.is_no_data());
}

#[tokio::test]
async fn test_heatmap() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);

    let query = HeatmapQuery::resolve(HeatmapPeriod::LastMonth, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
    let points = client.fetch_heatmap(query).await.unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].intensity, 1.0);
}

#[tokio::test]
async fn test_station_lifecycle() {
    let (base, backend) = spawn_backend().await;
    let client = client(&base);

    let stations = client.fetch_stations().await.unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].marker_type, MarkerType::Danger);
    assert_eq!(stations[0].author_name(), Some("ann"));
    assert!(stations[1].is_24_hours);

    let mut draft = StationDraft::at(GpsPoint::new(59.9, 30.3));
    draft.marker_type = MarkerType::Chat;
    draft.comment = "  meet here  ".into();
    draft.photo = Some(StationPhoto {
        file_name: "spot.jpg".into(),
        mime_type: "image/jpeg".into(),
        bytes: vec![0xFF, 0xD8, 0xFF],
    });
    let created = client.add_station(&draft).await.unwrap();
    assert_eq!(created.id, "new-1");

    let upload = backend.last_upload.lock().unwrap().clone().unwrap();
    assert!(upload.contains("name=\"markerType\""));
    assert!(upload.contains("chat"));
    assert!(upload.contains("meet here"));
    assert!(upload.contains("filename=\"spot.jpg\""));

    let updated = client.update_station("a1", &StationDraft::from_station(&stations[0])).await.unwrap();
    assert_eq!(updated.id, "a1");
    assert_eq!(updated.marker_type, MarkerType::Interesting);

    client.delete_station("a1").await.unwrap();
    let err = client.delete_station("missing").await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 404, message: "Station not found".into() });
}

#[tokio::test]
async fn test_like_refreshes_status() {
    let (base, _) = spawn_backend().await;
    let client = client(&base);

    let before = client.fetch_like_status("a1", 7).await.unwrap();
    assert!(!before.liked);

    let after = client.like_station("a1", 7).await.unwrap();
    assert!(after.liked);
    assert_eq!(after.likes, 1);
    assert_eq!(after.score(), -1);
}

#[tokio::test]
async fn test_poller_retries_then_publishes() {
    let (base, backend) = spawn_backend().await;
    let mut handle = ActiveUsersPoller::new(client(&base))
        .with_interval(Duration::from_secs(60))
        .spawn();

    let published = tokio::time::timeout(Duration::from_secs(5), handle.changed())
        .await
        .expect("poller published in time");
    assert!(published);

    let users = handle.latest();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, 7);
    assert_eq!(backend.active_users_calls.load(Ordering::SeqCst), 3);

    handle.stop();
    assert!(!handle.changed().await);
}

#[tokio::test]
async fn test_poll_gives_up_after_max_retries() {
    let (base, backend) = spawn_backend().await;
    backend.active_users_down.store(true, Ordering::SeqCst);
    let poller = ActiveUsersPoller::new(client(&base));

    let err = poller.poll_once().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.user_message(), "warming up");
    // One initial attempt plus three retries
    assert_eq!(backend.active_users_calls.load(Ordering::SeqCst), 4);
}
