//! HTTP surface
//!
//! All routes live under `/api/v1`:
//!
//! | method | path | body / query |
//! |---|---|---|
//! | POST | `/chat` | `ChatRequest` |
//! | POST | `/chat/stream` | `ChatRequest`, answered as server-sent events |
//! | POST | `/cache/invalidate` | `InvalidationRequest` |
//! | POST | `/cache/clear` | |
//! | GET | `/cache/stats` | |
//! | GET | `/cache/health` | |
//! | GET | `/unclear-questions/{tenant}` | `?status=pending` |
//! | PUT | `/unclear-questions/{id}/status` | `{"status": "resolved"}` |
//! | GET | `/health` | |

use concierge_cache::{InvalidationReport, InvalidationRequest};
use concierge_core::{ChatRequest, PipelineError, QueryPipeline, StreamEvent};
use concierge_dedup::UnclearStatus;
use concierge_model::{TenantId, UnclearId};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;
use warp::http::header::HeaderValue;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 64 * 1024;
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: UnclearStatus,
}

#[derive(Debug, Serialize)]
struct Cleared {
    cleared: u64,
}

fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PipelineError::ProviderUnavailable(_) | PipelineError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &PipelineError) -> Response {
    let body = ErrorBody {
        error: err.to_string(),
        retryable: err.is_retryable(),
    };
    json_response(&body, error_status(err))
}

fn with_request_id(mut response: Response, id: Uuid) -> Response {
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn with_pipeline(
    pipeline: Arc<QueryPipeline>,
) -> impl Filter<Extract = (Arc<QueryPipeline>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&pipeline))
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: for<'de> Deserialize<'de> + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Synthesis overrides are for in-process callers; HTTP clients never set one
fn untrusted(mut request: ChatRequest) -> ChatRequest {
    request.synthesis_override = None;
    request
}

async fn chat(request: ChatRequest, pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    let request = untrusted(request);
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id, tenant = %request.vendor_id);
    let response = match pipeline.answer(&request).instrument(span).await {
        Ok(answer) => json_response(&answer, StatusCode::OK),
        Err(err) => {
            tracing::warn!(%request_id, %err, "chat request failed");
            error_response(&err)
        }
    };
    Ok(with_request_id(response, request_id))
}

fn sse_event(event: &StreamEvent) -> warp::sse::Event {
    let name = match event {
        StreamEvent::Token { .. } => "token",
        StreamEvent::Done { .. } => "done",
        StreamEvent::Error { .. } => "error",
    };
    warp::sse::Event::default()
        .event(name)
        .json_data(event)
        .unwrap_or_else(|err| warp::sse::Event::default().event("error").data(err.to_string()))
}

async fn chat_stream(request: ChatRequest, pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    let request = untrusted(request);
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, tenant = %request.vendor_id, "streaming chat");
    let events = pipeline
        .answer_stream(request)
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));
    let reply = warp::sse::reply(warp::sse::keep_alive().stream(events)).into_response();
    Ok(with_request_id(reply, request_id))
}

async fn invalidate(request: InvalidationRequest, pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    let response = match pipeline.invalidate(request).await {
        Ok(report) if report.success => json_response(&report, StatusCode::OK),
        Ok(report) => json_response(&report, StatusCode::SERVICE_UNAVAILABLE),
        Err(err) => {
            let report = InvalidationReport {
                success: false,
                invalidated_count: 0,
                message: err.to_string(),
                partial: false,
            };
            json_response(&report, error_status(&err))
        }
    };
    Ok(response)
}

async fn clear(pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    let cleared = pipeline.clear_cache().await;
    Ok(json_response(&Cleared { cleared }, StatusCode::OK))
}

async fn stats(pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    Ok(json_response(&pipeline.cache_stats().await, StatusCode::OK))
}

async fn cache_health(pipeline: Arc<QueryPipeline>) -> Result<Response, Infallible> {
    let health = pipeline.cache_health();
    let status = if health.up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(json_response(&health, status))
}

async fn list_unclear(
    tenant: u64,
    query: StatusQuery,
    pipeline: Arc<QueryPipeline>,
) -> Result<Response, Infallible> {
    let status = match query.status.as_deref().map(str::parse::<UnclearStatus>).transpose() {
        Ok(status) => status,
        Err(reason) => return Ok(error_response(&PipelineError::invalid(reason))),
    };
    let response = match pipeline.unclear_questions(TenantId(tenant), status).await {
        Ok(records) => json_response(&records, StatusCode::OK),
        Err(err) => error_response(&err),
    };
    Ok(response)
}

async fn update_unclear(
    id: UnclearId,
    update: StatusUpdate,
    pipeline: Arc<QueryPipeline>,
) -> Result<Response, Infallible> {
    let response = match pipeline.set_unclear_status(id, update.status).await {
        Ok(record) => json_response(&record, StatusCode::OK),
        Err(err) => error_response(&err),
    };
    Ok(response)
}

/// Every route, without logging middleware
pub fn routes(
    pipeline: Arc<QueryPipeline>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let chat_route = warp::path!("chat")
        .and(warp::post())
        .and(json_body::<ChatRequest>())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(chat);

    let stream_route = warp::path!("chat" / "stream")
        .and(warp::post())
        .and(json_body::<ChatRequest>())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(chat_stream);

    let invalidate_route = warp::path!("cache" / "invalidate")
        .and(warp::post())
        .and(json_body::<InvalidationRequest>())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(invalidate);

    let clear_route = warp::path!("cache" / "clear")
        .and(warp::post())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(clear);

    let stats_route = warp::path!("cache" / "stats")
        .and(warp::get())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(stats);

    let health_route = warp::path!("cache" / "health")
        .and(warp::get())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(cache_health);

    let list_unclear_route = warp::path!("unclear-questions" / u64)
        .and(warp::get())
        .and(warp::query::<StatusQuery>())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(list_unclear);

    let update_unclear_route = warp::path!("unclear-questions" / UnclearId / "status")
        .and(warp::put())
        .and(json_body::<StatusUpdate>())
        .and(with_pipeline(Arc::clone(&pipeline)))
        .and_then(update_unclear);

    let liveness = warp::path!("health").and(warp::get()).map(|| {
        json_response(
            &serde_json::json!({ "status": "ok", "version": crate::VERSION }),
            StatusCode::OK,
        )
    });

    api.and(
        chat_route
            .or(stream_route)
            .unify()
            .or(invalidate_route)
            .unify()
            .or(clear_route)
            .unify()
            .or(stats_route)
            .unify()
            .or(health_route)
            .unify()
            .or(list_unclear_route)
            .unify()
            .or(update_unclear_route)
            .unify()
            .or(liveness)
            .unify(),
    )
}

/// Serve until `shutdown` resolves
///
/// # Errors
/// When `addr` cannot be bound
pub async fn serve<S>(pipeline: Arc<QueryPipeline>, addr: SocketAddr, shutdown: S) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (bound, server) = warp::serve(routes(pipeline).with(warp::trace::request()))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|err| anyhow::anyhow!("cannot bind {addr}: {err}"))?;
    tracing::info!(addr = %bound, "concierge listening");
    server.await;
    tracing::info!("concierge stopped");
    Ok(())
}
