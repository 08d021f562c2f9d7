//! Remote edit service: the external function `edit(markup, images) -> markup`.
//!
//! The session only sees the [`EditService`] trait. [`HttpEditService`] posts
//! the request as JSON to an endpoint and reads the replacement markup from a
//! plain-text body. [`StepwiseEditService`] runs a bounded loop of model turns
//! that each may rewrite an accumulated markup value.

use crate::{Error, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Request body sent to the edit service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    /// Markup of the displayed snapshot
    pub html: String,
    /// Data URI of the annotated viewport
    pub drawover_url: String,
    /// Data URI of the clean page
    pub page_url: String,
}

/// Anything that can turn markup plus captures into new markup
#[async_trait]
pub trait EditService: Send + Sync {
    async fn edit(&self, request: EditRequest) -> Result<String>;
}

/// Reject responses too short to be a document
pub fn validate_markup(markup: String, min_len: usize) -> Result<String> {
    let trimmed = markup.trim();
    if trimmed.len() < min_len {
        return Err(Error::MalformedResponse(format!(
            "expected at least {} bytes of markup, got {}",
            min_len,
            trimmed.len()
        )));
    }
    Ok(markup)
}

/// Posts [`EditRequest`]s to an HTTP endpoint
#[cfg(feature = "http")]
pub struct HttpEditService {
    client: reqwest::Client,
    endpoint: String,
    min_response_len: usize,
}

#[cfg(feature = "http")]
impl HttpEditService {
    pub fn new(config: &crate::SessionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_ms > 0 {
            builder = builder.timeout(std::time::Duration::from_millis(config.timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            min_response_len: config.min_response_len,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl EditService for HttpEditService {
    async fn edit(&self, request: EditRequest) -> Result<String> {
        debug!(
            "POST {} (html {} bytes, drawover {} bytes, page {} bytes)",
            self.endpoint,
            request.html.len(),
            request.drawover_url.len(),
            request.page_url.len()
        );

        let res = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            warn!("edit service answered {}", status);
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("edit service returned {} bytes of markup", body.len());
        validate_markup(body, self.min_response_len)
    }
}

/// What one model turn decided
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction {
    /// Replace the accumulated markup
    Replace(String),
    /// Record a natural-language description of the change, markup untouched
    Describe(String),
    /// Stop iterating
    Finish,
}

/// State threaded through every turn of [`StepwiseEditService`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditAccumulator {
    pub markup: String,
    pub notes: Vec<String>,
    pub steps: usize,
}

/// One call to a model that can see the request and the accumulated state
#[async_trait]
pub trait ModelTurn: Send + Sync {
    async fn turn(&self, request: &EditRequest, acc: &EditAccumulator) -> Result<TurnAction>;
}

/// Runs up to `max_steps` model turns, each free to rewrite the markup.
///
/// Covers both the two-stage flow (describe the sketch, then rewrite) and a
/// single-stage rewrite; callers only see the final markup.
pub struct StepwiseEditService<M> {
    model: M,
    max_steps: usize,
    min_response_len: usize,
}

impl<M: ModelTurn> StepwiseEditService<M> {
    pub fn new(model: M, max_steps: usize, min_response_len: usize) -> Self {
        Self {
            model,
            max_steps: max_steps.max(1),
            min_response_len,
        }
    }

    /// Run the loop and return the accumulator by value
    pub async fn run(&self, request: &EditRequest) -> Result<EditAccumulator> {
        let mut acc = EditAccumulator {
            markup: request.html.clone(),
            ..Default::default()
        };
        while acc.steps < self.max_steps {
            let action = self.model.turn(request, &acc).await?;
            acc.steps += 1;
            match action {
                TurnAction::Replace(markup) => acc.markup = markup,
                TurnAction::Describe(note) => acc.notes.push(note),
                TurnAction::Finish => break,
            }
        }
        debug!("stepwise edit finished after {} step(s)", acc.steps);
        Ok(acc)
    }
}

#[async_trait]
impl<M: ModelTurn> EditService for StepwiseEditService<M> {
    async fn edit(&self, request: EditRequest) -> Result<String> {
        let acc = self.run(&request).await?;
        validate_markup(acc.markup, self.min_response_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EditRequest {
        EditRequest {
            html: "<p>Hello</p>".into(),
            drawover_url: "data:image/jpeg;base64,AAAA".into(),
            page_url: "data:image/jpeg;base64,BBBB".into(),
        }
    }

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let v = serde_json::to_value(request()).unwrap();
        assert_eq!(v["html"], "<p>Hello</p>");
        assert!(v.get("drawoverUrl").is_some());
        assert!(v.get("pageUrl").is_some());
        assert!(v.get("drawover_url").is_none());
    }

    #[test]
    fn short_markup_is_rejected() {
        assert!(matches!(
            validate_markup("   ".into(), 1),
            Err(Error::MalformedResponse(_))
        ));
        assert!(validate_markup("<p>ok</p>".into(), 5).is_ok());
    }

    struct Scripted(Vec<TurnAction>);

    #[async_trait]
    impl ModelTurn for Scripted {
        async fn turn(&self, _req: &EditRequest, acc: &EditAccumulator) -> Result<TurnAction> {
            Ok(self.0.get(acc.steps).cloned().unwrap_or(TurnAction::Finish))
        }
    }

    #[tokio::test]
    async fn stepwise_threads_accumulator_through_turns() {
        let svc = StepwiseEditService::new(
            Scripted(vec![
                TurnAction::Describe("add a world".into()),
                TurnAction::Replace("<p>Hello World</p>".into()),
                TurnAction::Finish,
                TurnAction::Replace("never reached".into()),
            ]),
            8,
            5,
        );
        let acc = svc.run(&request()).await.unwrap();
        assert_eq!(acc.markup, "<p>Hello World</p>");
        assert_eq!(acc.notes, vec!["add a world".to_string()]);
        assert_eq!(acc.steps, 3);
    }

    #[tokio::test]
    async fn stepwise_stops_at_max_steps() {
        let turns = (0..10).map(|i| TurnAction::Replace(format!("<p>v{}</p>", i))).collect();
        let svc = StepwiseEditService::new(Scripted(turns), 3, 5);
        let out = svc.edit(request()).await.unwrap();
        assert_eq!(out, "<p>v2</p>");
    }
}
