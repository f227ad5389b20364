//! Portfolio assistant
//!
//! Answers free-text questions about a tenant's portfolio by handing the
//! rendered context and the question to an external completion service.
//! Each answer is appended to the tenant's query log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{DomainPort, PortError, TenantId};

use crate::aggregation::AggregationEngine;
use crate::context::ContextBuilder;
use crate::error::AnalyticsError;
use crate::query_log::{QueryLog, QueryLogEntry};
use crate::snapshot::AggregateSnapshot;

/// Text-in, text-out completion collaborator (an LLM API in production)
#[async_trait]
pub trait CompletionService: DomainPort {
    async fn complete(&self, prompt: &str) -> Result<String, PortError>;
}

/// An answered question together with what it was answered from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantAnswer {
    pub query: String,
    pub response: String,
    pub context: String,
    pub snapshot: AggregateSnapshot,
    pub answered_at: DateTime<Utc>,
}

/// Builds the prompt sent to the completion service
pub fn compose_prompt(context: &str, query: &str) -> String {
    format!(
        "You are an AI assistant for GCC insurance analytics. Analyze this query using the user's portfolio data:\n\n\
         {context}\n\n\
         User Query: {query}\n\n\
         Provide a concise, actionable response with specific numbers and recommendations. \
         Focus on GCC market context, Takaful considerations, and regulatory implications where relevant."
    )
}

/// Answers portfolio questions
#[derive(Clone)]
pub struct PortfolioAssistant {
    engine: AggregationEngine,
    context: ContextBuilder,
    completion: Arc<dyn CompletionService>,
    query_log: Arc<dyn QueryLog>,
}

impl PortfolioAssistant {
    pub fn new(
        engine: AggregationEngine,
        context: ContextBuilder,
        completion: Arc<dyn CompletionService>,
        query_log: Arc<dyn QueryLog>,
    ) -> Self {
        Self {
            engine,
            context,
            completion,
            query_log,
        }
    }

    /// Answers a question about the tenant's portfolio
    ///
    /// # Errors
    ///
    /// - `AnalyticsError::EmptyQuery` for a blank question; nothing is read
    /// - `AnalyticsError::Storage` if the snapshot cannot be computed
    /// - `AnalyticsError::Completion` if the collaborator fails
    ///
    /// A query log write failure is logged and does not fail the answer.
    #[instrument(skip(self, query))]
    pub async fn answer(&self, tenant_id: TenantId, query: &str) -> Result<AssistantAnswer, AnalyticsError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AnalyticsError::EmptyQuery);
        }

        let snapshot = self.engine.compute_snapshot(tenant_id).await?;
        let context = self.context.render(&snapshot);
        let prompt = compose_prompt(&context, query);

        let response = self.completion.complete(&prompt).await.map_err(|source| {
            warn!(error = %source, "Completion failed");
            AnalyticsError::Completion(source)
        })?;

        info!(
            context_chars = context.chars().count(),
            response_chars = response.chars().count(),
            "Query answered"
        );
        let answer = AssistantAnswer {
            query: query.to_string(),
            response,
            context,
            snapshot,
            answered_at: Utc::now(),
        };

        let entry = QueryLogEntry::new(tenant_id, &answer.query, &answer.response, answer.answered_at);
        if let Err(error) = self.query_log.record(&entry).await {
            warn!(query_id = %entry.id, error = %error, "Query log write failed");
        }
        Ok(answer)
    }
}

/// Scripted completion service for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Returns queued responses in order and records every prompt
    ///
    /// With nothing queued it answers with a fixed acknowledgement.
    #[derive(Debug, Default)]
    pub struct ScriptedCompletionService {
        responses: Mutex<VecDeque<Result<String, PortError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletionService {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn push_response(&self, response: impl Into<String>) {
            self.responses.lock().await.push_back(Ok(response.into()));
        }

        pub async fn push_error(&self, error: PortError) {
            self.responses.lock().await.push_back(Err(error));
        }

        /// Prompts received so far
        pub async fn prompts(&self) -> Vec<String> {
            self.prompts.lock().await.clone()
        }
    }

    impl DomainPort for ScriptedCompletionService {}

    #[async_trait]
    impl CompletionService for ScriptedCompletionService {
        async fn complete(&self, prompt: &str) -> Result<String, PortError> {
            self.prompts.lock().await.push(prompt.to_string());
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok("Acknowledged.".to_string()))
        }
    }
}
