use super::handlers::{
    catalog_handler, connect_handler, connections_handler, disconnect_handler, handle_rejection,
    health_handler, message_flow_handler, node_info_handler, raw_msg_handler, reject,
    reset_message_flow_handler, CatalogQuery,
};
use crate::error::Error;
use crate::exchange_log::LogFilter;
use crate::session::Session;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Every route, with errors rendered as JSON and CORS open to any origin.
pub fn routes(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    health_route_filter()
        .or(node_info_route_filter(session.clone()))
        .or(catalog_route_filter(session.clone()))
        .or(connect_route_filter(session.clone()))
        .or(disconnect_route_filter(session.clone()))
        .or(raw_msg_route_filter(session.clone()))
        .or(message_flow_route_filter(session.clone()))
        .or(reset_message_flow_route_filter(session.clone()))
        .or(connections_route_filter(session))
        .recover(handle_rejection)
        .with(cors)
}

/// GET /health
pub fn health_route_filter() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_handler)
}

/// GET /node-info
pub fn node_info_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("node-info")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_session(session))
        .and_then(node_info_handler)
}

/// GET /catalog?category=
pub fn catalog_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("catalog")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<CatalogQuery>())
        .and(with_session(session))
        .and_then(catalog_handler)
}

/// POST /connect. The body may be empty.
pub fn connect_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("connect")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_or_default())
        .and(with_session(session))
        .and_then(connect_handler)
}

/// POST /disconnect
pub fn disconnect_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("disconnect")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_session(session))
        .and_then(disconnect_handler)
}

/// POST /raw-msg
pub fn raw_msg_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("raw-msg")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_session(session))
        .and_then(raw_msg_handler)
}

/// GET /message-flow/{connection_id}?direction=&type=&after=
pub fn message_flow_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("message-flow")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<LogFilter>())
        .and(with_session(session))
        .and_then(message_flow_handler)
}

/// DELETE /message-flow/{connection_id}
pub fn reset_message_flow_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("message-flow")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_session(session))
        .and_then(reset_message_flow_handler)
}

/// GET /connections
pub fn connections_route_filter(
    session: Arc<Session>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("connections")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_session(session))
        .and_then(connections_handler)
}

/// inject session
fn with_session(
    session: Arc<Session>,
) -> impl Filter<Extract = (Arc<Session>,), Error = Infallible> + Clone {
    warp::any().map(move || session.clone())
}

/// A JSON body of at most `MAX_BODY_BYTES`, or `T::default()` when the
/// body is empty. `warp::body::content_length_limit` answers 411 to a POST
/// without `content-length`, which is how an empty body often arrives, so
/// the limit is applied here instead.
fn json_or_default<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Default + Send + 'static,
{
    warp::header::optional::<u64>("content-length")
        .and_then(|length: Option<u64>| async move {
            match length {
                Some(length) if length > MAX_BODY_BYTES => Err(reject(Error::BodyTooLarge {
                    limit: MAX_BODY_BYTES,
                })),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move {
            if body.len() as u64 > MAX_BODY_BYTES {
                return Err(reject(Error::BodyTooLarge {
                    limit: MAX_BODY_BYTES,
                }));
            }
            if body.iter().all(|byte| byte.is_ascii_whitespace()) {
                return Ok(T::default());
            }
            serde_json::from_slice::<T>(&body)
                .map_err(|err| reject(Error::InvalidRequest(format!("invalid JSON body: {}", err))))
        })
}
