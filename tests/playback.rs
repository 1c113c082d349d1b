//! Integration tests for gated playback and its watch-history write.

use std::time::Duration;

use dramabox::api::{ApiClient, DramaBundle};
use dramabox::app::{App, DramaState, PlayOutcome};
use dramabox::catalog::{DramaDetail, EpisodeRef};
use dramabox::config::Config;
use dramabox::session::{LaunchContext, Session};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bundle() -> DramaBundle {
    DramaBundle {
        detail: DramaDetail {
            id: "88".to_string(),
            title: "Hidden Heir".to_string(),
            cover_url: "https://img.example.com/88.jpg".to_string(),
            synopsis: String::new(),
            tags: Vec::new(),
        },
        episodes: (0..3)
            .map(|i| EpisodeRef {
                index: i,
                display_number: (i + 1).to_string(),
                video_url: Some(format!("https://cdn.example.com/88/{i}.mp4")),
            })
            .collect(),
    }
}

/// A member session bootstrapped against `server`, with a drama open.
async fn member_app(server: &MockServer, user_id: i64) -> App {
    Mock::given(method("POST"))
        .and(path("/api/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "telegram_id": user_id })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/subscription/check/{user_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "is_active": false })))
        .mount(server)
        .await;

    let user = json!({ "id": user_id, "first_name": "Dewi" }).to_string();
    let init_data = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("user", &user)
        .finish();
    let launch = LaunchContext::from_init_data(&init_data).unwrap();

    let client = ApiClient::with_base_url(&server.uri()).unwrap();
    let config = Config::default();
    let session = Session::bootstrap(&client, &launch, &config).await;
    assert!(!session.is_guest());

    let mut app = App::new(client, config, session);
    app.drama = DramaState::Loaded(Box::new(bundle()));
    app
}

#[tokio::test]
async fn test_slow_history_write_is_awaited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/history"))
        .and(body_partial_json(json!({
            "telegram_id": 321,
            "book_id": "88",
            "episode_number": 2
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok" }))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut app = member_app(&server, 321).await;

    assert!(matches!(app.play_episode(1), PlayOutcome::Ready { .. }));
    assert_eq!(app.pending_writes(), 1);

    let unfinished = app.finish_pending_writes(Duration::from_secs(5)).await;
    assert_eq!(unfinished, 0);
    assert_eq!(app.pending_writes(), 0);

    let recorded = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/history")
        .count();
    assert_eq!(recorded, 1);
}

#[tokio::test]
async fn test_write_wait_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let mut app = member_app(&server, 322).await;
    assert!(matches!(app.play_episode(0), PlayOutcome::Ready { .. }));

    let unfinished = app.finish_pending_writes(Duration::from_millis(100)).await;
    assert_eq!(unfinished, 1);
    assert_eq!(app.pending_writes(), 0);
}

#[tokio::test]
async fn test_denied_play_records_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut app = member_app(&server, 323).await;
    app.config.free_episode_limit = 1;

    assert!(matches!(app.play_episode(2), PlayOutcome::Denied { .. }));
    assert_eq!(app.pending_writes(), 0);
    assert_eq!(app.finish_pending_writes(Duration::from_millis(50)).await, 0);
}
