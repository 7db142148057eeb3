//! Webhook server for Facebook Messenger
//!
//! `GET /` answers health checks, `GET /webhook` performs the subscription
//! handshake and `POST /webhook` receives message events.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{FacebookError, Result};
use crate::handler::{EventOutcome, MessageHandler};

/// Body returned by the health check
pub const HEALTH_TEXT: &str = "Facebook Gemini Bot is running.";

/// Body returned once a page payload has been processed
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Query parameters of the verification handshake
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyParams {
    pub mode: Option<String>,
    pub verify_token: Option<String>,
    pub challenge: Option<String>,
}

impl VerifyParams {
    /// Pick the handshake parameters out of raw query pairs. A key given more
    /// than once resolves to `None`, so it can never verify.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let single = |key: &str| {
            let mut values = pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v);
            match (values.next(), values.next()) {
                (Some(value), None) => Some(value.clone()),
                _ => None,
            }
        };

        Self {
            mode: single("hub.mode"),
            verify_token: single("hub.verify_token"),
            challenge: single("hub.challenge"),
        }
    }
}

/// Create webhook router
pub fn create_router(handler: Arc<MessageHandler>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn health() -> &'static str {
    HEALTH_TEXT
}

async fn verify_webhook(
    State(handler): State<Arc<MessageHandler>>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(pairs)) => VerifyParams::from_pairs(&pairs),
        Err(e) => {
            warn!("Unreadable verification query: {}", e);
            return status_response(StatusCode::FORBIDDEN);
        }
    };

    let result = handler.api().verify_webhook(
        params.mode.as_deref().unwrap_or_default(),
        params.verify_token.as_deref().unwrap_or_default(),
        params.challenge.as_deref().unwrap_or_default(),
    );

    match result {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(_) => status_response(StatusCode::FORBIDDEN),
    }
}

async fn receive_webhook(
    State(handler): State<Arc<MessageHandler>>,
    body: Bytes,
) -> Response {
    let payload = match handler.api().parse_webhook(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Webhook error: {}", e);
            return status_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if !payload.is_page() {
        debug!("Ignoring webhook for object {:?}", payload.object);
        return status_response(StatusCode::NOT_FOUND);
    }

    let outcomes = handler.process_payload(&payload).await;

    let failed: usize = outcomes
        .iter()
        .map(|o| match o {
            EventOutcome::Replied { failed, .. } => *failed,
            EventOutcome::Skipped(_) => 0,
        })
        .sum();
    if failed > 0 {
        warn!("{} of the replies in this payload were not delivered", failed);
    }
    debug!("Processed {} messaging events", outcomes.len());

    (StatusCode::OK, EVENT_RECEIVED).into_response()
}

/// Status code with its canonical reason as a plain-text body
fn status_response(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

/// Bind `addr` and serve the webhook until `shutdown` resolves
pub async fn serve<F>(addr: &str, handler: Arc<MessageHandler>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(handler);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| FacebookError::Server(format!("failed to bind {}: {}", addr, e)))?;

    info!("Server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FacebookError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_verify_params_from_pairs() {
        let params = VerifyParams::from_pairs(&pairs(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "token"),
            ("hub.challenge", "42"),
            ("other", "x"),
        ]));
        assert_eq!(params.mode.as_deref(), Some("subscribe"));
        assert_eq!(params.verify_token.as_deref(), Some("token"));
        assert_eq!(params.challenge.as_deref(), Some("42"));

        assert_eq!(VerifyParams::from_pairs(&[]), VerifyParams::default());
    }

    #[test]
    fn test_duplicate_verify_param_is_unset() {
        let params = VerifyParams::from_pairs(&pairs(&[
            ("hub.mode", "subscribe"),
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "token"),
        ]));
        assert_eq!(params.mode, None);
        assert_eq!(params.verify_token.as_deref(), Some("token"));
    }
}
