//! Scripted completion provider for unit tests

use agent_llm::{CompletionRequest, CompletionResponse, LLMError, LLMProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays canned replies in order and records every request
pub(crate) struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub(crate) fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::scripted([Err(message.to_string())])
    }

    fn scripted(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(CompletionResponse::from_text(text)),
            Some(Err(message)) => Err(LLMError::RequestFailed(message)),
            None => Err(LLMError::RequestFailed("no scripted reply left".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
