use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::chat::SessionToken;
use crate::services::agent::{ChatModel, ConversationAgent};

use super::marker::MarkerCache;

/// Result of [`SessionRegistry::resolve_or_create`]
pub struct Resolved {
    pub agent: Arc<ConversationAgent>,
    pub token: SessionToken,
    /// A new agent was built for this request
    pub created: bool,
    /// Session the client asked to reset. It stays registered until the
    /// caller commits the turn with [`SessionRegistry::commit`].
    pub replaced: Option<SessionToken>,
}

/// Owns every live agent, keyed by session token.
///
/// Creation is not exclusive: two requests racing on the same unmapped token
/// both build an agent and the later insert wins.
pub struct SessionRegistry {
    agents: DashMap<SessionToken, Arc<ConversationAgent>>,
    markers: Arc<dyn MarkerCache>,
    model: Arc<dyn ChatModel>,
    system_prompt: Arc<str>,
    max_history: usize,
}

impl SessionRegistry {
    pub fn new(
        model: Arc<dyn ChatModel>,
        markers: Arc<dyn MarkerCache>,
        system_prompt: impl Into<Arc<str>>,
        max_history: usize,
    ) -> Self {
        info!("Initializing session registry (history window: {} messages)", max_history);
        Self {
            agents: DashMap::new(),
            markers,
            model,
            system_prompt: system_prompt.into(),
            max_history,
        }
    }

    pub async fn resolve_or_create(&self, token: Option<&str>, reset: bool) -> Resolved {
        let presented = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(SessionToken::new);

        let (token, replaced) = match presented {
            Some(old) if reset => {
                debug!("Session {} reset by client", old.short());
                (SessionToken::generate(), Some(old))
            }
            Some(token) => {
                if let Some(agent) = self.get(&token) {
                    return Resolved { agent, token, created: false, replaced: None };
                }
                if self.is_marked(&token).await {
                    info!(
                        "Session {} known to marker cache but not in this process, recreating",
                        token.short()
                    );
                }
                (token, None)
            }
            None => (SessionToken::generate(), None),
        };

        let agent = self.spawn_agent(&token).await;
        Resolved { agent, token, created: true, replaced }
    }

    /// The turn succeeded: drop the session a reset replaced.
    pub async fn commit(&self, resolved: &Resolved) {
        if let Some(old) = &resolved.replaced {
            self.discard(old).await;
        }
    }

    /// The turn failed: forget an agent built for it, since the client never
    /// receives its token. Existing sessions are left alone.
    pub async fn rollback(&self, resolved: &Resolved) {
        if resolved.created {
            self.discard(&resolved.token).await;
            debug!("Rolled back session {}", resolved.token.short());
        }
    }

    pub fn get(&self, token: &SessionToken) -> Option<Arc<ConversationAgent>> {
        self.agents.get(token).map(|entry| entry.value().clone())
    }

    /// Drop the session. Returns `false` when nothing was registered under it.
    pub async fn end(&self, token: &SessionToken) -> bool {
        if self.agents.remove(token).is_none() {
            return false;
        }
        self.clear_marker(token).await;
        info!("Session {} ended", token.short());
        true
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Drop agents idle for longer than `max_idle`. Returns how many went.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<SessionToken> = self
            .agents
            .iter()
            .filter(|entry| entry.value().idle_for() >= max_idle)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for token in stale {
            // Re-check: a request may have touched it since the scan
            let evicted = self
                .agents
                .remove_if(&token, |_, agent| agent.idle_for() >= max_idle)
                .is_some();
            if evicted {
                self.clear_marker(&token).await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Swept {} idle sessions ({} remain)", removed, self.len());
        }
        removed
    }

    /// Tear down every session at process exit.
    pub async fn shutdown(&self) {
        let tokens: Vec<SessionToken> = self.agents.iter().map(|e| e.key().clone()).collect();
        for token in &tokens {
            self.agents.remove(token);
            self.clear_marker(token).await;
        }
        info!("Session registry shut down, dropped {} sessions", tokens.len());
    }

    async fn spawn_agent(&self, token: &SessionToken) -> Arc<ConversationAgent> {
        let agent = Arc::new(ConversationAgent::new(
            self.model.clone(),
            self.system_prompt.clone(),
            self.max_history,
        ));
        self.agents.insert(token.clone(), agent.clone());

        if let Err(e) = self.markers.mark(token).await {
            warn!("Failed to mark session {}: {:#}", token.short(), e);
        }

        info!("Created agent for session {} ({} active)", token.short(), self.len());
        agent
    }

    async fn discard(&self, token: &SessionToken) {
        self.agents.remove(token);
        self.clear_marker(token).await;
    }

    async fn is_marked(&self, token: &SessionToken) -> bool {
        match self.markers.is_marked(token).await {
            Ok(marked) => marked,
            Err(e) => {
                warn!("Failed to read marker for session {}: {:#}", token.short(), e);
                false
            }
        }
    }

    async fn clear_marker(&self, token: &SessionToken) {
        if let Err(e) = self.markers.clear(token).await {
            warn!("Failed to clear marker for session {}: {:#}", token.short(), e);
        }
    }
}
