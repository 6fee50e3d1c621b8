use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::models::chat::ChatMessage;

use super::model::ChatModel;
use super::types::{parse_structured, AgentOutcome};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    Model(#[from] anyhow::Error),

    #[error("model returned no content")]
    EmptyResponse,
}

/// Stateful conversation bound to one session.
///
/// History is checkpointed per thread id and replayed on every turn, so a
/// caller only ever sends the new messages.
pub struct ConversationAgent {
    model: Arc<dyn ChatModel>,
    system_prompt: Arc<str>,
    max_history: usize,
    checkpoints: Mutex<HashMap<String, Vec<ChatMessage>>>,
    last_activity: Mutex<Instant>,
}

impl ConversationAgent {
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: Arc<str>, max_history: usize) -> Self {
        Self {
            model,
            system_prompt,
            max_history,
            checkpoints: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Run one turn on `thread_id`.
    ///
    /// The history lock is never held across the model call; two turns racing
    /// on one thread may interleave their appends.
    pub async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        thread_id: &str,
    ) -> Result<AgentOutcome, AgentError> {
        self.touch();

        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(ChatMessage::system(&*self.system_prompt));
        prompt.extend(self.history(thread_id));
        prompt.extend(messages.iter().cloned());

        debug!("Invoking agent on thread {} with {} messages", thread_id, prompt.len());

        let reply = self.model.complete(&prompt).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AgentError::EmptyResponse);
        }

        self.checkpoint(thread_id, messages, ChatMessage::assistant(reply));

        Ok(match parse_structured(reply) {
            Some(structured) => AgentOutcome::Structured(structured),
            None => AgentOutcome::Raw(reply.to_string()),
        })
    }

    /// Snapshot of the stored history for a thread
    pub fn history(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.checkpoints
            .lock()
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn checkpoint(&self, thread_id: &str, turn: Vec<ChatMessage>, reply: ChatMessage) {
        let mut checkpoints = self.checkpoints.lock();
        let history = checkpoints.entry(thread_id.to_string()).or_default();
        history.extend(turn);
        history.push(reply);

        // Sliding window, cut on a turn boundary so replay never opens with
        // an assistant reply
        if history.len() > self.max_history {
            let mut cut = history.len() - self.max_history;
            while cut < history.len() && history[cut].role != "user" {
                cut += 1;
            }
            history.drain(..cut);
        }
    }
}
