//! RemoteBackend against a mock board API.

use corkboard::{
    BatchEntry, BoardBackend, CardPatch, Connection, ConnectionPatch, CorkboardError, Point,
};
use corkboard_remote::{RemoteBackend, RemoteConfig};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, RemoteBackend) {
    let server = MockServer::start().await;
    let remote = RemoteBackend::new(&RemoteConfig {
        api_url: format!("{}/api/boards/7", server.uri()),
        timeout_secs: 5,
    })
    .unwrap();
    (server, remote)
}

#[tokio::test]
async fn send_batch_posts_entries() {
    let (server, remote) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/boards/7/cards/batch"))
        .and(body_json(json!({
            "entries": [
                {"id": "c1", "changes": {"title": "A", "content": "B"}},
                {"id": "c2", "changes": {"position": {"x": 10.0, "y": 20.0}}}
            ]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let entries = vec![
        BatchEntry {
            id: "c1".into(),
            changes: CardPatch {
                title: Some("A".into()),
                content: Some("B".into()),
                ..Default::default()
            },
        },
        BatchEntry {
            id: "c2".into(),
            changes: CardPatch::position(Point::new(10.0, 20.0)),
        },
    ];
    remote.send_batch(&entries).await.unwrap();
    assert!(remote.last_success_timestamp() > 0);
}

#[tokio::test]
async fn connection_calls_use_card_scoped_routes() {
    let (server, remote) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/boards/7/cards/c1/connections"))
        .and(body_json(json!({
            "id": "k1",
            "startOffset": {"x": 20.0, "y": 10.0},
            "endPoint": {"x": 300.0, "y": 50.0}
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/boards/7/cards/c1/connections/k1"))
        .and(body_json(json!({"endPoint": {"x": 1.0, "y": 2.0}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/boards/7/cards/c1/connections/k1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/boards/7/cards/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    remote
        .create_connection(
            "c1",
            &Connection {
                id: "k1".into(),
                start_offset: Point::new(20.0, 10.0),
                end_point: Point::new(300.0, 50.0),
            },
        )
        .await
        .unwrap();
    remote
        .update_connection(
            "c1",
            "k1",
            &ConnectionPatch {
                start_offset: None,
                end_point: Some(Point::new(1.0, 2.0)),
            },
        )
        .await
        .unwrap();
    remote.delete_connection("c1", "k1").await.unwrap();
    remote.delete_card("c1").await.unwrap();
}

#[tokio::test]
async fn refresh_decodes_cards() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/boards/7/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [{
                "id": "c1",
                "title": "Groceries",
                "position": {"x": 80.0, "y": 40.0},
                "dimensions": {"width": 200.0, "height": 120.0},
                "connections": [{
                    "id": "k1",
                    "startOffset": {"x": 20.0, "y": 10.0},
                    "endPoint": {"x": 300.0, "y": 50.0}
                }]
            }]
        })))
        .mount(&server)
        .await;

    let cards = remote.refresh_entities().await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].title, "Groceries");
    assert_eq!(cards[0].content, "");
    assert!(!cards[0].folded);
    assert_eq!(
        cards[0].connections[0].start_point(cards[0].position),
        Point::new(100.0, 50.0)
    );
}

#[tokio::test]
async fn error_status_maps_to_http_error() {
    let (server, remote) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/boards/7/cards/batch"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"message": "maintenance"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/boards/7/cards/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = remote.send_batch(&[]).await.unwrap_err();
    assert_eq!(
        err,
        CorkboardError::Http {
            status: 503,
            message: "maintenance".into()
        }
    );
    assert!(err.is_transient());

    let err = remote.delete_card("gone").await.unwrap_err();
    assert_eq!(
        err,
        CorkboardError::Http {
            status: 404,
            message: "Not Found".into()
        }
    );
}

#[tokio::test]
async fn garbage_body_is_a_json_error() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/boards/7/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        remote.refresh_entities().await,
        Err(CorkboardError::Json(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let remote = RemoteBackend::new(&RemoteConfig {
        api_url: "http://127.0.0.1:1/api".to_string(),
        timeout_secs: 2,
    })
    .unwrap();

    let err = remote.refresh_entities().await.unwrap_err();
    assert!(matches!(err, CorkboardError::Network(_)));
    assert!(err.is_transient());
}
