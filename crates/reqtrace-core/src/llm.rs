//! Injectable LLM capability
//!
//! The engine needs exactly one thing from a language model: turn a prompt
//! into text. Transport, model choice, auth and deadlines all belong to the
//! caller. [`LlmFn`] adapts an async closure and [`TimeoutLlm`] adds a
//! per-call deadline around any client.

use crate::error::LlmError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// A prompt-in, text-out language model call
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the raw response text
    ///
    /// # Errors
    /// Any transport, timeout or empty-response failure. Callers inside the
    /// engine absorb these and fall back to programmatic behavior.
    async fn call(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Adapter from an async closure to [`LlmClient`]
///
/// ```rust,ignore
/// use reqtrace_core::llm::{LlmClient, LlmFn};
///
/// let llm = LlmFn::new(|prompt: String| async move {
///     let text = my_provider::complete(&prompt).await?;
///     Ok::<_, anyhow::Error>(text)
/// });
/// let walker = TraceWalker::new(TraceConfig::default(), Some(Arc::new(llm)))?;
/// ```
pub struct LlmFn<F> {
    f: F,
}

impl<F> LlmFn<F> {
    /// Wrap a closure
    #[inline]
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for LlmFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> LlmClient for LlmFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    async fn call(&self, prompt: &str) -> Result<String, LlmError> {
        let response = (self.f)(prompt.to_string()).await?;
        if response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response)
    }
}

/// Per-call deadline around another client
#[derive(Debug)]
pub struct TimeoutLlm<C> {
    inner: C,
    timeout: Duration,
}

impl<C: LlmClient> TimeoutLlm<C> {
    /// Wrap a client with a deadline
    #[inline]
    #[must_use]
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Configured deadline
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for TimeoutLlm<C> {
    async fn call(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.call(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("LLM call exceeded {:?}", self.timeout);
                Err(LlmError::Timeout {
                    duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}
