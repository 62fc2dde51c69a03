//! Edit generators the server can hand to the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use engine::{EditGenerator, EditRequest, EngineError, ItineraryItem, ProposedEdits, TripDoc};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    user_request: &'a str,
    edit_doc: bool,
    edit_itinerary: bool,
    trip_doc: Value,
    itinerary: &'a [ItineraryItem],
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Asks a remote diff service for edits over JSON.
#[derive(Debug, Clone)]
pub struct RemoteEditGenerator {
    endpoint: Url,
    http: reqwest::Client,
}

impl RemoteEditGenerator {
    pub fn new(endpoint: &str) -> Result<Self, EngineError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| EngineError::Validation(format!("invalid AI endpoint: {err}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| EngineError::Validation(format!("invalid AI client: {err}")))?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait]
impl EditGenerator for RemoteEditGenerator {
    async fn generate(
        &self,
        request: &EditRequest,
        doc: &TripDoc,
        items: &[ItineraryItem],
    ) -> Result<ProposedEdits, EngineError> {
        let payload = GenerateRequest {
            user_request: &request.user_request,
            edit_doc: request.edit_doc,
            edit_itinerary: request.edit_itinerary,
            trip_doc: doc.to_json(),
            itinerary: items,
        };

        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| EngineError::Generator(format!("request failed: {err}")))?;

        if res.status().is_success() {
            return res
                .json::<ProposedEdits>()
                .await
                .map_err(|err| EngineError::Generator(format!("unreadable response: {err}")));
        }

        let status = res.status();
        let body = res
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(EngineError::Generator(format!("{status}: {body}")))
    }
}

/// Used when no AI endpoint is configured: every proposal fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerator;

#[async_trait]
impl EditGenerator for UnconfiguredGenerator {
    async fn generate(
        &self,
        _request: &EditRequest,
        _doc: &TripDoc,
        _items: &[ItineraryItem],
    ) -> Result<ProposedEdits, EngineError> {
        Err(EngineError::Generator(
            "no AI endpoint configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use chrono::Utc;
    use engine::PatchOp;
    use serde_json::{Map, json};

    fn doc() -> TripDoc {
        TripDoc {
            trip_id: "trip".to_string(),
            revision: 3,
            updated_at: Utc::now(),
            body: Map::new(),
        }
    }

    fn request() -> EditRequest {
        EditRequest {
            user_request: "add notes".to_string(),
            edit_doc: true,
            edit_itinerary: false,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/edits")
    }

    #[tokio::test]
    async fn remote_edits_are_decoded() {
        let app = Router::new().route(
            "/edits",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["user_request"], "add notes");
                assert_eq!(body["trip_doc"]["revision"], 3);
                Json(json!({
                    "trip_doc_patch": [
                        {"op": "replace", "path": "/shared_notes", "value": "bring sunscreen"}
                    ]
                }))
            }),
        );
        let generator = RemoteEditGenerator::new(&serve(app).await).unwrap();

        let edits = generator.generate(&request(), &doc(), &[]).await.unwrap();
        assert_eq!(
            edits.trip_doc_patch,
            vec![PatchOp::Replace {
                path: "/shared_notes".to_string(),
                value: json!("bring sunscreen"),
            }]
        );
        assert!(edits.itinerary_ops.is_empty());
    }

    #[tokio::test]
    async fn remote_failure_is_a_generator_error() {
        let app = Router::new().route(
            "/edits",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({"error": "model overloaded"})),
                )
            }),
        );
        let generator = RemoteEditGenerator::new(&serve(app).await).unwrap();

        let err = generator
            .generate(&request(), &doc(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Generator(msg) if msg.contains("model overloaded")));
    }

    #[tokio::test]
    async fn unconfigured_generator_always_fails() {
        let err = UnconfiguredGenerator
            .generate(&request(), &doc(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Generator(_)));
    }

    #[test]
    fn endpoint_must_be_a_url() {
        assert!(matches!(
            RemoteEditGenerator::new("not a url"),
            Err(EngineError::Validation(_))
        ));
    }
}
