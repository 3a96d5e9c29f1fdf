use super::api_message::{
    ConnectBody, ConnectResponse, DisconnectBody, ErrorResponse, HealthResponse, LogEntryView,
    MessageView, NodeInfoResponse, RawMessageBody, RawMessageResponse, SuccessResponse,
};
use crate::catalog::{Category, MessageDefinition, INIT};
use crate::error::Error;
use crate::exchange_log::LogFilter;
use crate::session::Session;
use crate::time::{create_timestamp, format_timestamp};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

pub type Result<T> = std::result::Result<T, Rejection>;

/// Carries a crate error through warp's rejection machinery so
/// `handle_rejection` can render it.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl warp::reject::Reject for ApiError {}

pub fn reject(err: Error) -> Rejection {
    warp::reject::custom(ApiError(err))
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UnknownType(_) | Error::UnknownConnection(_) => StatusCode::NOT_FOUND,
        Error::SchemaViolation { .. }
        | Error::TruncatedMessage { .. }
        | Error::Malformed(_)
        | Error::InvalidRequest(_)
        | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::HandshakeRequired { .. } | Error::AlreadyConnected(_) => StatusCode::CONFLICT,
        Error::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::StorageExhausted { .. } => StatusCode::INSUFFICIENT_STORAGE,
        Error::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Config(_) | Error::Io(_) | Error::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CatalogQuery {
    pub category: Option<String>,
}

pub async fn health_handler() -> Result<impl Reply> {
    Ok(warp::reply::json(&HealthResponse {
        status: String::from("healthy"),
        time: format_timestamp(create_timestamp()),
        message: String::from("API is running"),
        runner_status: String::from("running"),
    }))
}

pub async fn node_info_handler(session: Arc<Session>) -> Result<impl Reply> {
    let node_id = session.peer_node_id().map_err(reject)?;
    let features = session
        .catalog()
        .lookup(INIT)
        .ok()
        .and_then(|init| init.default_payload.get("features").map(|value| value.to_json()))
        .unwrap_or(Value::Null);
    Ok(warp::reply::json(&NodeInfoResponse {
        node_id,
        peer: session.peer_name().to_string(),
        active_connections: session.active_connections().await,
        features,
    }))
}

pub async fn catalog_handler(query: CatalogQuery, session: Arc<Session>) -> Result<impl Reply> {
    let category = match query.category {
        Some(category) => Some(category.parse::<Category>().map_err(reject)?),
        None => None,
    };
    let definitions = session.catalog().list(category);
    let definitions: Vec<&MessageDefinition> = definitions.iter().map(|definition| definition.as_ref()).collect();
    Ok(warp::reply::json(&definitions))
}

pub async fn connect_handler(body: ConnectBody, session: Arc<Session>) -> Result<impl Reply> {
    let (request, timeout) = body.into_request();
    let outcome = session.connect(request, timeout).await.map_err(reject)?;

    let catalog = session.catalog();
    let sent = MessageView::from_entry(&outcome.sent, catalog);
    let received = MessageView::from_entry(&outcome.received, catalog);
    Ok(warp::reply::json(&ConnectResponse {
        connection_id: outcome.connection.id.clone(),
        status: String::from("connected"),
        node_id: outcome.connection.remote_node_id.clone(),
        messages: vec![sent.clone(), received.clone()],
        sent,
        received,
    }))
}

pub async fn disconnect_handler(body: DisconnectBody, session: Arc<Session>) -> Result<impl Reply> {
    let connection = session
        .disconnect(&body.connprivkey)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&connection))
}

pub async fn raw_msg_handler(body: RawMessageBody, session: Arc<Session>) -> Result<impl Reply> {
    let overrides = body.content.unwrap_or_default();
    let timeout = body.timeout_ms.map(Duration::from_millis);
    let outcome = session
        .send_raw(&body.connprivkey, &body.msg_type, &overrides, timeout)
        .await
        .map_err(reject)?;

    let catalog = session.catalog();
    let sent = MessageView::from_entry(&outcome.sent, catalog);
    let reply = outcome
        .received
        .as_ref()
        .map(|entry| MessageView::from_entry(entry, catalog));
    let mut messages = vec![sent.clone()];
    messages.extend(reply.clone());
    Ok(warp::reply::json(&RawMessageResponse {
        sent,
        reply,
        messages,
    }))
}

pub async fn message_flow_handler(
    connection_id: String,
    filter: LogFilter,
    session: Arc<Session>,
) -> Result<impl Reply> {
    let snapshot = session.fetch_log(&connection_id, filter).await;
    let catalog = session.catalog();
    let entries: Vec<LogEntryView> = snapshot
        .iter()
        .map(|entry| LogEntryView::from_entry(entry, catalog))
        .collect();
    Ok(warp::reply::json(&entries))
}

pub async fn reset_message_flow_handler(connection_id: String, session: Arc<Session>) -> Result<impl Reply> {
    session.reset_log(&connection_id).await;
    Ok(warp::reply::json(&SuccessResponse { success: true }))
}

pub async fn connections_handler(session: Arc<Session>) -> Result<impl Reply> {
    Ok(warp::reply::json(&session.connections().await))
}

/// Renders every rejection as `{success: false, error, type}`.
pub async fn handle_rejection(rejection: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, error, kind) = if let Some(ApiError(err)) = rejection.find::<ApiError>() {
        (status_for(err), err.to_string(), err.kind().to_string())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("no such route"), String::from("NotFound"))
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.to_string(), String::from("InvalidRequest"))
    } else if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, err.to_string(), String::from("InvalidRequest"))
    } else if let Some(err) = rejection.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, err.to_string(), String::from("PayloadTooLarge"))
    } else if let Some(err) = rejection.find::<warp::reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string(), String::from("InvalidRequest"))
    } else if let Some(err) = rejection.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, err.to_string(), String::from("MethodNotAllowed"))
    } else {
        event!(Level::ERROR, "unhandled rejection: {:?}", rejection);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("internal error"),
            String::from("Internal"),
        )
    };

    if status.is_server_error() {
        event!(Level::ERROR, "{} {}: {}", status.as_u16(), kind, error);
    } else {
        event!(Level::INFO, "{} {}: {}", status.as_u16(), kind, error);
    }

    let body = warp::reply::json(&ErrorResponse {
        success: false,
        error,
        kind,
    });
    Ok(warp::reply::with_status(body, status))
}
