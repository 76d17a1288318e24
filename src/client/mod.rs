//! Client for the planner API, plus the state the UI keeps around it.
//!
//! [`PlannerClient::stream_itinerary`] reads the generation stream one chunk
//! at a time and hands typed [`StreamEvent`]s to a callback, which usually
//! feeds an [`ItineraryBoard`].

use std::future::Future;

use futures::future::{abortable, AbortHandle};
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::middleware::current_user::USER_HEADER;
use crate::models::itinerary::{DaySummary, GenerateItineraryRequest, GenerationResult};
use crate::models::place::GeoPoint;
use crate::models::plan::{TravelPlan, TravelPlanCreate};
use crate::sse::{SseDecoder, SseFrame};

pub mod board;
pub mod map;
pub mod session;

pub use board::{BoardError, ItineraryBoard};
pub use map::MapProvider;
pub use session::{SavedSession, SessionStore};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded frame of the itinerary stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Started {
        travel_plan_id: String,
        destination: String,
    },
    Heartbeat {
        ts: f64,
    },
    Progress {
        stage: String,
    },
    Token {
        delta: String,
    },
    Day(DaySummary),
    Result(Box<GenerationResult>),
    Error {
        message: String,
    },
    /// Unknown events and payloads that did not match their event type.
    Other {
        event: String,
        data: String,
    },
}

#[derive(Deserialize)]
struct StartedPayload {
    travel_plan_id: String,
    #[serde(default)]
    destination: String,
}

#[derive(Deserialize)]
struct HeartbeatPayload {
    ts: f64,
}

#[derive(Deserialize)]
struct ProgressPayload {
    stage: String,
}

#[derive(Deserialize)]
struct TokenPayload {
    delta: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl StreamEvent {
    pub fn from_frame(frame: SseFrame) -> Self {
        fn parse<T: DeserializeOwned>(frame: &SseFrame) -> Option<T> {
            serde_json::from_str(&frame.data).ok()
        }

        let event = match frame.event.as_str() {
            "started" => parse::<StartedPayload>(&frame).map(|p| StreamEvent::Started {
                travel_plan_id: p.travel_plan_id,
                destination: p.destination,
            }),
            "heartbeat" => parse::<HeartbeatPayload>(&frame).map(|p| StreamEvent::Heartbeat { ts: p.ts }),
            "progress" => parse::<ProgressPayload>(&frame).map(|p| StreamEvent::Progress { stage: p.stage }),
            "token" => parse::<TokenPayload>(&frame).map(|p| StreamEvent::Token { delta: p.delta }),
            "day" => parse::<DaySummary>(&frame).map(StreamEvent::Day),
            "result" => parse::<GenerationResult>(&frame).map(|r| StreamEvent::Result(Box::new(r))),
            "error" => parse::<ErrorPayload>(&frame).map(|p| StreamEvent::Error { message: p.message }),
            _ => None,
        };
        event.unwrap_or(StreamEvent::Other {
            event: frame.event,
            data: frame.data,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

pub struct PlannerClient {
    http: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
}

impl PlannerClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8000/api/v1`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/travel{}", self.base_url, path));
        match &self.user_id {
            Some(user_id) => builder.header(USER_HEADER, user_id),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    pub async fn create_plan(&self, plan: &TravelPlanCreate) -> Result<TravelPlan, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/plans")
            .json(plan)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<TravelPlan, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/plans/{}", plan_id))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// `Ok(None)` when the server could not resolve the address.
    pub async fn geocode(
        &self,
        address: &str,
        location: Option<&str>,
    ) -> Result<Option<GeoPoint>, ClientError> {
        let mut query = vec![("address", address)];
        if let Some(location) = location {
            query.push(("location", location));
        }
        let response = self
            .request(reqwest::Method::GET, "/geocode")
            .query(&query)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?.json().await?))
    }

    /// Runs a streaming generation to the end, calling `on_event` for every frame.
    pub async fn stream_itinerary<F>(
        &self,
        plan_id: &str,
        request: &GenerateItineraryRequest,
        mut on_event: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(StreamEvent),
    {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/plans/{}/generate-itinerary/stream", plan_id),
            )
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for frame in decoder.push(&chunk?) {
                on_event(StreamEvent::from_frame(frame));
            }
        }
        if let Some(frame) = decoder.finish() {
            on_event(StreamEvent::from_frame(frame));
        }
        Ok(())
    }

    /// Same as [`stream_itinerary`](Self::stream_itinerary), with a handle to
    /// abort it. An aborted stream resolves to [`StreamOutcome::Cancelled`].
    pub fn stream_itinerary_abortable<'a, F>(
        &'a self,
        plan_id: &'a str,
        request: &'a GenerateItineraryRequest,
        on_event: F,
    ) -> (
        impl Future<Output = Result<StreamOutcome, ClientError>> + 'a,
        AbortHandle,
    )
    where
        F: FnMut(StreamEvent) + 'a,
    {
        let (stream, handle) = abortable(self.stream_itinerary(plan_id, request, on_event));
        let outcome = async move {
            match stream.await {
                Ok(Ok(())) => Ok(StreamOutcome::Completed),
                Ok(Err(e)) => Err(e),
                Err(_aborted) => {
                    log::info!("Itinerary stream cancelled");
                    Ok(StreamOutcome::Cancelled)
                }
            }
        };
        (outcome, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_from_frame_decodes_known_events() {
        assert_eq!(
            StreamEvent::from_frame(frame("token", r#"{"delta":"成"}"#)),
            StreamEvent::Token {
                delta: "成".to_string()
            }
        );
        assert_eq!(
            StreamEvent::from_frame(frame("progress", r#"{"stage":"persist"}"#)),
            StreamEvent::Progress {
                stage: "persist".to_string()
            }
        );
        assert_eq!(
            StreamEvent::from_frame(frame("error", r#"{"message":"boom"}"#)),
            StreamEvent::Error {
                message: "boom".to_string()
            }
        );

        let day = StreamEvent::from_frame(frame(
            "day",
            r#"{"day_number":2,"items":[],"stats":{"spots":0,"restaurants":0,"schedule":{"morning":0,"afternoon":0,"evening":0}}}"#,
        ));
        assert!(matches!(day, StreamEvent::Day(ref d) if d.day_number == 2));
    }

    #[test]
    fn test_from_frame_keeps_unknown_and_malformed() {
        assert_eq!(
            StreamEvent::from_frame(frame("message", "hello")),
            StreamEvent::Other {
                event: "message".to_string(),
                data: "hello".to_string()
            }
        );
        assert!(matches!(
            StreamEvent::from_frame(frame("day", "{not json")),
            StreamEvent::Other { .. }
        ));
    }
}
