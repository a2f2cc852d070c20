//! Publisher handler (C7): reads the request body, transforms it into a
//! message envelope, publishes it to a broker topic, and writes a response
//! built from the resulting message context (spec §4.7), grounded on the
//! source's `handler/nats/{natspublisher.go,nbbtransformer.go}` (HTTP-POST
//! broker adapter substituted for NATS per spec §9).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::middleware::auth::Claims;
use crate::planner::Endpoint;
use crate::router::SharedPipeline;

/// Publishes a message to a topic. The HTTP-POST adapter is the default
/// (spec §9); implementations are expected to reconnect transparently —
/// the handler itself never retries (spec §4.7).
#[async_trait::async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), String>;
}

pub struct HttpBroker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBroker {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait::async_trait]
impl MessageBroker for HttpBroker {
    async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), topic);
        self.client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?
            .error_for_status()
            .map_err(|err| err.to_string())?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct EndpointPublisherConfig {
    #[serde(default)]
    topic: String,
}

/// Per-request scratch state threaded from `transformMessage` into
/// `buildResponse` (spec §4.7 "MessageContext").
#[derive(Debug, Default, Clone)]
pub struct MessageContext {
    pub source: String,
    pub topic: String,
    pub headers: HashMap<String, Value>,
    pub correlation_id: Option<Uuid>,
    pub command_id: Option<Uuid>,
}

pub type TransformMessage =
    Arc<dyn Fn(&mut MessageContext, Option<&Claims>, &[u8]) -> Result<Vec<u8>, String> + Send + Sync>;
pub type BuildResponse =
    Arc<dyn Fn(&MessageContext) -> Result<Option<Vec<u8>>, String> + Send + Sync>;

/// `publisher(brokerConfig, options...)` (spec §4.7 "Construction").
pub struct PublisherOptions {
    pub source: String,
    pub topic_prefix: String,
    pub broker: Arc<dyn MessageBroker>,
    pub transform_message: TransformMessage,
    pub build_response: BuildResponse,
}

pub fn publisher_handler(options: Arc<PublisherOptions>, endpoint: &Endpoint) -> SharedPipeline {
    let config: EndpointPublisherConfig = endpoint
        .handler_config
        .clone()
        .as_object()
        .map(|_| serde_json::from_value(endpoint.handler_config.clone()).unwrap_or_default())
        .unwrap_or_default();

    Arc::new(move |request: Request<Body>| {
        let options = options.clone();
        let topic = config.topic.clone();
        Box::pin(async move { handle(options, topic, request).await })
    })
}

async fn handle(options: Arc<PublisherOptions>, topic: String, request: Request<Body>) -> Response {
    let claims = request.extensions().get::<Claims>().cloned();

    let mut context = MessageContext {
        source: options.source.clone(),
        topic: format!("{}{}", options.topic_prefix, topic),
        headers: HashMap::new(),
        correlation_id: None,
        command_id: None,
    };

    let (_, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "publisher: failed reading request body");
            return (StatusCode::BAD_REQUEST, "failed reading request body").into_response();
        }
    };

    let transformed = match (options.transform_message)(&mut context, claims.as_ref(), &body_bytes) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "publisher: transform failed");
            return internal_error(&err);
        }
    };

    if let Err(err) = options.broker.publish(&context.topic, transformed).await {
        error!(%err, topic = %context.topic, "publisher: broker publish failed");
        return internal_error(&err);
    }

    let response_body = match (options.build_response)(&context) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "publisher: build_response failed");
            return internal_error(&err);
        }
    };

    match response_body {
        Some(bytes) => (StatusCode::OK, bytes).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

fn internal_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
}

/// Recognized `transformMessage` implementation for command publishing
/// (spec §4.7 "Message envelope transform"), grounded exactly on
/// `nbbtransformer.go`'s `TransformMessage`.
pub fn command_envelope_transform(
    context: &mut MessageContext,
    claims: Option<&Claims>,
    payload: &[u8],
) -> Result<Vec<u8>, String> {
    let claims = claims.ok_or_else(|| "claims not present or not authenticated".to_string())?;

    let user_id = claims
        .0
        .get("sub")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "sub claim not found".to_string())?;
    let charisma_user_id = claims
        .0
        .get("charisma_user_id")
        .cloned()
        .ok_or_else(|| "charisma_user_id claim not found".to_string())?;

    let correlation_id = Uuid::new_v4();
    let command_id = Uuid::new_v4();
    let publish_time = chrono::Utc::now().to_rfc3339();

    context.correlation_id = Some(correlation_id);
    context.command_id = Some(command_id);

    let mut payload: Value = serde_json::from_slice(payload).unwrap_or(json!({}));
    if let Value::Object(ref mut map) = payload {
        map.insert("commandId".to_string(), json!(command_id));
        map.insert("metadata".to_string(), json!({ "creationDate": publish_time }));
    }

    let envelope = json!({
        "headers": {
            "userId": user_id,
            "charismaUserId": charisma_user_id,
            "correlationId": correlation_id,
            "messageId": Uuid::new_v4(),
            "source": context.source,
            "publishTime": publish_time,
        },
        "payload": payload,
    });

    serde_json::to_vec(&envelope).map_err(|err| err.to_string())
}

/// The paired `buildResponse` for [`command_envelope_transform`]: returns
/// `{CommandId, CorrelationId}` from the message context (spec §8
/// scenario 8).
pub fn command_response(context: &MessageContext) -> Result<Option<Vec<u8>>, String> {
    let correlation_id = context
        .correlation_id
        .ok_or_else(|| "correlation id not found in message context".to_string())?;
    let command_id = context
        .command_id
        .ok_or_else(|| "command id not found in message context".to_string())?;

    let body = json!({
        "CommandId": command_id,
        "CorrelationId": correlation_id,
    });
    serde_json::to_vec(&body).map(Some).map_err(|err| err.to_string())
}

/// No-op transform: forwards the payload unchanged (source: `NoTransformation`).
pub fn no_transformation(
    _context: &mut MessageContext,
    _claims: Option<&Claims>,
    payload: &[u8],
) -> Result<Vec<u8>, String> {
    Ok(payload.to_vec())
}

/// Empty response builder (source: `EmptyResponse`).
pub fn empty_response(_context: &MessageContext) -> Result<Option<Vec<u8>>, String> {
    Ok(None)
}
