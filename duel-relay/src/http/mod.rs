//! HTTP endpoints for duel-relay.
//!
//! Provides the room WebSocket, room-rules lookup and health check.

pub mod health;

use crate::server::DuelRelay;
use crate::session::PlayerSession;
use axum::{
    extract::{ws::WebSocketUpgrade, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use duel_types::{RoomId, RuleSet, SenderId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<DuelRelay>) -> Router {
    Router::new()
        .route("/websocket/:room/:id/:rule_set", get(websocket_handler))
        .route("/getroomrules/:room_id", get(room_rules_handler))
        .route("/health", get(health::health_handler))
        .layer(Extension(relay))
}

/// Path segments of a room connection.
#[derive(Debug, Deserialize)]
struct RoomPath {
    room: String,
    id: String,
    rule_set: String,
}

/// Upgrade to a WebSocket and join the room.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(RoomPath { room, id, rule_set }): Path<RoomPath>,
    Extension(relay): Extension<Arc<DuelRelay>>,
) -> Response {
    tracing::debug!("WebSocket upgrade: room={} id={} rules={}", room, id, rule_set);
    let session = PlayerSession::new(
        relay,
        RoomId::from(room),
        SenderId::from(id),
        RuleSet::new(&rule_set),
    );
    ws.on_upgrade(move |socket| session.run(socket))
}

/// Look up the rule set of a live room.
async fn room_rules_handler(
    Path(room_id): Path<String>,
    Extension(relay): Extension<Arc<DuelRelay>>,
) -> Response {
    match relay.room_rules(&RoomId::from(room_id)) {
        Some(rule_set) => Json(json!({ "rule_set": rule_set })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Room does not exist" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_relay() -> Arc<DuelRelay> {
        Arc::new(DuelRelay::new(Config::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_relay());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn room_rules_for_live_room() {
        let relay = test_relay();
        relay
            .join_room(
                &RoomId::from("a1b2c3"),
                &SenderId::from("a"),
                &RuleSet::new("chess960"),
            )
            .unwrap();
        let app = build_router(relay);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getroomrules/a1b2c3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "rule_set": "chess960" }));
    }

    #[tokio::test]
    async fn room_rules_for_unknown_room_is_404() {
        let app = build_router(test_relay());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getroomrules/ffffff")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Room does not exist" })
        );
    }

    #[tokio::test]
    async fn websocket_route_requires_upgrade() {
        let app = build_router(test_relay());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/websocket/a1b2c3/peer-a/standard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
