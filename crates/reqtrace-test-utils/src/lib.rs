//! Testing utilities for the reqtrace workspace
//!
//! Shared fixtures, a scripted LLM double and tracing setup.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use reqtrace_artifact::{Epic, Requirement, StoryCriterion, TestCase, TestStep, UserStory};
use reqtrace_core::{ArtifactSet, LlmClient, LlmError, TraceConfig, TraceWalker};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Install a fmt subscriber honoring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// LLM double that replays queued responses, then a fallback
#[derive(Debug)]
pub struct ScriptedLlm {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl ScriptedLlm {
    /// Always answer with `response`
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Ok(response.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Always fail with a transport error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Err(message.into()),
            ..Self::always("")
        }
    }

    /// Queue one response ahead of the fallback
    #[must_use]
    pub fn then(self, response: impl Into<String>) -> Self {
        self.queue.lock().push_back(Ok(response.into()));
        self
    }

    /// Queue one transport failure ahead of the fallback
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.queue.lock().push_back(Err(message.into()));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn call(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let next = self.queue.lock().pop_front();
        match next.unwrap_or_else(|| self.fallback.clone()) {
            Ok(text) if text.trim().is_empty() => Err(LlmError::EmptyResponse),
            Ok(text) => Ok(text),
            Err(message) => Err(LlmError::Transport(anyhow::anyhow!(message))),
        }
    }
}

/// Walker with default configuration and no LLM
pub fn programmatic_walker() -> TraceWalker {
    TraceWalker::new(TraceConfig::default(), None).unwrap()
}

/// Walker sharing `llm` with the caller so call counts can be inspected
pub fn walker_with(config: TraceConfig, llm: Arc<ScriptedLlm>) -> TraceWalker {
    let llm: Arc<dyn LlmClient> = llm;
    TraceWalker::new(config, Some(llm)).unwrap()
}

/// Roughly fifty-word epic about warehouse inventory
pub fn inventory_epic() -> Epic {
    Epic::new(
        "EP-INV",
        "Warehouse inventory",
        "Operations staff manage warehouse inventory across several regional sites. They receive \
         incoming shipments, record stock levels for each product, move pallets between locations, \
         reconcile counts against purchase orders, and raise alerts when quantities fall below \
         reorder points so that replenishment happens before customers notice any shortage in \
         their online orders.",
    )
}

/// Requirement with a five-word description and no acceptance criteria
pub fn vague_requirement(id: &str) -> Requirement {
    Requirement::new(id, "Misc item", "Handle the thing somehow later")
}

/// Epic whose only requirement is vague and unrelated to it
pub fn vague_requirement_chain() -> (Epic, ArtifactSet) {
    let epic = inventory_epic().with_requirements(["REQ-V1"]);
    let set = ArtifactSet::new().with_requirements(vec![vague_requirement("REQ-V1")]);
    (epic, set)
}

/// User story with nothing but an id and title
pub fn empty_story(id: &str, parent: &str) -> UserStory {
    UserStory::new(id, "Restock alert", parent)
}

/// Test case with no steps
pub fn stepless_test_case(id: &str, parent: &str) -> TestCase {
    TestCase::new(id, "Restock alert fires", parent)
}

/// Login epic whose requirement, story and test case all clear every gate
pub fn login_epic() -> Epic {
    Epic::new(
        "EP-LOGIN",
        "Customer account login",
        "Registered customers sign in to their account with an email address and password, \
         recover a forgotten password through a reset link, and see clear messages when \
         credentials are rejected.",
    )
    .with_requirements(["REQ-L1"])
}

pub fn login_requirement() -> Requirement {
    Requirement::new(
        "REQ-L1",
        "Email and password sign in",
        "Registered customers sign in to their account with an email address and password; \
         the system verifies the credentials and opens the account dashboard within two seconds.",
    )
    .with_criteria([
        "Valid email and password open the account dashboard",
        "Invalid password shows an error message and the account stays on the sign in page",
        "Empty email field is rejected before submission",
    ])
}

pub fn login_story() -> UserStory {
    UserStory::new("US-L1", "Sign in with email", "REQ-L1")
        .with_statement(
            "registered customer",
            "sign in with my email and password",
            "I can reach my account dashboard",
        )
        .with_criteria(vec![
            StoryCriterion::new(
                "a registered customer with a valid email and password",
                "they submit the sign in form",
                "the account dashboard opens",
            ),
            StoryCriterion::new(
                "a registered customer",
                "they submit an invalid password",
                "an error message shows and the account stays on the sign in page",
            ),
            StoryCriterion::new(
                "the sign in form",
                "the email field is empty",
                "submission is rejected before the request is sent",
            ),
        ])
}

pub fn login_test_case() -> TestCase {
    TestCase::new("TC-L1", "Sign in rejects invalid and empty credentials", "US-L1")
        .with_description(
            "Checks the error path for an invalid password, the empty email edge case and the \
             maximum password length limit.",
        )
        .with_steps(vec![
            TestStep::new(
                "As a registered customer with a valid email and password, submit the sign in form",
                "The account dashboard opens",
            ),
            TestStep::new(
                "Submit the sign in form with an invalid password",
                "An error message shows and the account stays on the sign in page",
            ),
            TestStep::new(
                "Leave the email field empty and submit",
                "Submission is rejected before the request is sent",
            ),
        ])
        .with_expected_result("The customer reaches the dashboard only with valid credentials")
        .with_test_type("functional")
}

/// Login epic with its full requirement, story and test case chain
pub fn login_chain() -> (Epic, ArtifactSet) {
    let set = ArtifactSet::new()
        .with_requirements(vec![login_requirement()])
        .with_user_stories(vec![login_story()])
        .with_test_cases(vec![login_test_case()]);
    (login_epic(), set)
}
