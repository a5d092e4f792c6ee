//! HTTP handlers for the client API and the internal replica protocol.
//!
//! The client endpoints (`/kv/:key`) go through the [`Router`] and therefore
//! fan out across the cluster. The internal endpoints
//! (`/internal/replica/...`) touch only this node's local store; they are what
//! the coordinator of another node calls through its transport.
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{event, Level};

use crate::error::Error;
use crate::router::rebalance::Rebalancer;
use crate::router::{LocalStore, Router};
use crate::transport::{
    ReplicaDelete, ReplicaPut, REPLICA_DELETE_PATH, REPLICA_GET_PATH, REPLICA_PUT_PATH,
};

/// Path of the on-demand rebalance control operation.
pub const REBALANCE_PATH: &str = "/internal/rebalance";

/// Builds the HTTP application for one node.
pub fn app(router: Arc<Router>, local: LocalStore, rebalancer: Arc<Rebalancer>) -> axum::Router {
    axum::Router::new()
        .route("/kv/:key", put(put_key).get(get_key).delete(delete_key))
        .route(REPLICA_PUT_PATH, post(replica_put))
        .route(REPLICA_GET_PATH, get(replica_get))
        .route(REPLICA_DELETE_PATH, post(replica_delete))
        .route(REBALANCE_PATH, post(trigger_rebalance))
        .route("/health", get(health))
        .route("/debug/keys", get(debug_keys))
        .layer(Extension(router))
        .layer(Extension(local))
        .layer(Extension(rebalancer))
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
        Error::NoReplicas | Error::ReplicationPartial { .. } | Error::Transport { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

async fn put_key(
    Extension(router): Extension<Arc<Router>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Response {
    event!(Level::INFO, "API PUT key={}", key);
    match router.put(Bytes::from(key), body).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(err) => {
            event!(Level::ERROR, "PUT failed: {:?}", err);
            error_response(err)
        }
    }
}

async fn get_key(Extension(router): Extension<Arc<Router>>, Path(key): Path<String>) -> Response {
    event!(Level::INFO, "API GET key={}", key);
    match router.get(Bytes::from(key)).await {
        Ok(value) => (StatusCode::OK, value).into_response(),
        Err(err) => {
            if !err.is_not_found() {
                event!(Level::ERROR, "GET failed: {:?}", err);
            }
            error_response(err)
        }
    }
}

async fn delete_key(
    Extension(router): Extension<Arc<Router>>,
    Path(key): Path<String>,
) -> Response {
    event!(Level::INFO, "API DELETE key={}", key);
    match router.delete(Bytes::from(key)).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(err) => {
            event!(Level::ERROR, "DELETE failed: {:?}", err);
            error_response(err)
        }
    }
}

async fn replica_put(Extension(local): Extension<LocalStore>, body: Bytes) -> Response {
    let request: ReplicaPut = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(err.into()),
    };

    event!(Level::DEBUG, "Replica PUT key={:?}", request.key);
    match local.put(request.key, request.value).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(err) => error_response(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct ReplicaGetParams {
    key: Option<String>,
}

async fn replica_get(
    Extension(local): Extension<LocalStore>,
    Query(params): Query<ReplicaGetParams>,
) -> Response {
    let Some(key) = params.key.filter(|k| !k.is_empty()) else {
        return error_response(Error::MalformedRequest {
            reason: "missing key".to_string(),
        });
    };

    event!(Level::DEBUG, "Replica GET key={}", key);
    match local.get(key.as_bytes()).await {
        Ok(Some(value)) => (StatusCode::OK, value).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(err) => error_response(err.into()),
    }
}

async fn replica_delete(Extension(local): Extension<LocalStore>, body: Bytes) -> Response {
    let request: ReplicaDelete = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(err.into()),
    };

    event!(Level::DEBUG, "Replica DELETE key={:?}", request.key);
    match local.delete(&request.key).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(err) => error_response(err.into()),
    }
}

async fn trigger_rebalance(Extension(rebalancer): Extension<Arc<Rebalancer>>) -> Response {
    match rebalancer.run(None).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => error_response(err),
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn debug_keys(Extension(local): Extension<LocalStore>) -> Response {
    match local.keys().await {
        Ok(keys) => {
            let keys: Vec<String> = keys
                .iter()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .collect();
            Json(keys).into_response()
        }
        Err(err) => error_response(err.into()),
    }
}
