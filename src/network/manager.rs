//! Network interception manager.
//!
//! Consumes the six `Network.*` input events of one scope and turns them
//! into [`Request`] / [`Response`] objects and an ordered stream of
//! [`NetworkEvent`]s.
//!
//! # Feeds
//!
//! | Feed | Events | Key |
//! |------|--------|-----|
//! | direct | `requestWillBeSent`, `responseReceived`, `loadingFinished`, `loadingFailed`, `requestServedFromCache` | requestId |
//! | interception | `requestIntercepted` | interceptionId |
//!
//! With protocol interception off only the direct feed exists and requests
//! open immediately. With it on, the two halves of a request are joined
//! through a [`CorrelationIndex`].
//!
//! Protocol interception is on whenever the caller enabled interception or
//! configured credentials. In the credentials-only case every paused request
//! is continued automatically.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::connection::{Channel, EventHandler};
use crate::error::Result;
use crate::identifiers::{InterceptionId, ListenerId, RequestId};
use crate::protocol::event::NETWORK_EVENTS;
use crate::protocol::network::{
    AuthChallengeResponse, AuthResponse, Headers, LoadingFailed, LoadingFinished, RequestIntercepted,
    RequestPattern, RequestServedFromCache, RequestWillBeSent, ResponsePayload, ResponseReceived,
};
use crate::protocol::{Command, NetworkCommand, ParsedEvent};

use super::correlation::{CorrelationIndex, RequestHash};
use super::fulfill::status_text;
use super::request::Request;
use super::response::Response;
use super::types::{Credentials, NetworkEvent};

// ============================================================================
// State
// ============================================================================

/// Direct-feed event waiting for its interception counterpart.
struct ParkedRequest {
    event: Box<RequestWillBeSent>,
    redirect_chain: Vec<Request>,
}

/// Hop closed out by an interception-feed redirect.
///
/// The destination is opened by the direct-feed redirect event of the same
/// requestId and takes over the interception.
struct RedirectHandoff {
    redirect_chain: Vec<Request>,
    interception_id: InterceptionId,
    /// The interception is still paused, waiting on the caller.
    paused: bool,
}

#[derive(Default)]
struct ManagerState {
    requests: FxHashMap<RequestId, Request>,
    intercepted: FxHashMap<InterceptionId, Request>,
    correlation: CorrelationIndex<ParkedRequest, InterceptionId>,
    redirect_handoffs: FxHashMap<RequestId, RedirectHandoff>,
    /// Direct-feed redirects of intercepted hops, keyed by the interception
    /// whose redirect event has not arrived yet.
    redirect_destinations: FxHashMap<InterceptionId, ParkedRequest>,
    extra_headers: Headers,
    offline: bool,
    credentials: Option<Credentials>,
    attempted_authentications: FxHashSet<InterceptionId>,
    user_request_interception: bool,
    protocol_request_interception: bool,
    user_cache_disabled: bool,
}

impl ManagerState {
    fn forget(&mut self, request: &Request) {
        if self.requests.get(request.request_id()) == Some(request) {
            self.requests.remove(request.request_id());
        }
        if let Some(interception_id) = request.interception_id() {
            self.intercepted.remove(interception_id);
            self.attempted_authentications.remove(interception_id);
        }
    }

    fn take_redirect_destination(&mut self, hash: &RequestHash) -> Option<ParkedRequest> {
        let interception_id = self
            .redirect_destinations
            .iter()
            .find(|(_, parked)| RequestHash::of(&parked.event.request) == *hash)
            .map(|(interception_id, _)| interception_id.clone())?;
        self.redirect_destinations.remove(&interception_id)
    }
}

/// Work produced while the state lock is held.
#[derive(Default)]
struct Effects {
    commands: Vec<Command>,
    events: Vec<NetworkEvent>,
}

// ============================================================================
// ManagerInner
// ============================================================================

struct ManagerInner {
    channel: Arc<dyn Channel>,
    state: Mutex<ManagerState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NetworkEvent>>>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        for id in self.listeners.get_mut().drain(..) {
            self.channel.events().off(id);
        }
    }
}

impl ManagerInner {
    fn handle(&self, method: &str, params: &Value) {
        let event = ParsedEvent::parse(method, params.clone());
        let mut state = self.state.lock();

        let effects = match event {
            ParsedEvent::RequestWillBeSent(event) => self.on_request_will_be_sent(&mut state, *event),
            ParsedEvent::RequestIntercepted(event) => self.on_request_intercepted(&mut state, *event),
            ParsedEvent::ResponseReceived(event) => Self::on_response_received(&state, &event),
            ParsedEvent::LoadingFinished(event) => Self::on_loading_finished(&mut state, &event),
            ParsedEvent::LoadingFailed(event) => Self::on_loading_failed(&mut state, &event),
            ParsedEvent::RequestServedFromCache(event) => {
                Self::on_served_from_cache(&state, &event);
                Effects::default()
            }
            ParsedEvent::Unknown { method, .. } => {
                warn!(method = %method, "Undecodable network event dropped");
                Effects::default()
            }
            _ => Effects::default(),
        };

        self.apply(state, effects);
    }

    /// Publishes events before releasing `state`, then sends commands.
    ///
    /// Subscribers see events in the order the state changes happened, even
    /// when configuration calls race the dispatch task.
    fn apply(&self, state: MutexGuard<'_, ManagerState>, effects: Effects) {
        if !effects.events.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for event in effects.events {
                subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            }
        }
        drop(state);

        for command in effects.commands {
            if let Err(e) = self.channel.execute_detached(command) {
                warn!(error = %e, "Failed to send interception command");
            }
        }
    }

    fn open(
        &self,
        state: &mut ManagerState,
        event: &RequestWillBeSent,
        interception_id: Option<InterceptionId>,
        redirect_chain: Vec<Request>,
        effects: &mut Effects,
    ) {
        let request = Request::new(
            Arc::clone(&self.channel),
            event,
            interception_id.clone(),
            state.user_request_interception,
            redirect_chain,
        );

        trace!(
            request_id = %event.request_id,
            interception_id = ?interception_id,
            url = %request.url(),
            "Request opened"
        );

        state
            .requests
            .insert(event.request_id.clone(), request.clone());
        if let Some(interception_id) = interception_id {
            state.intercepted.insert(interception_id, request.clone());
        }
        effects.events.push(NetworkEvent::Request(request));
    }

    /// Closes out a redirected hop and returns the chain for the next hop.
    fn close_out_redirect(
        state: &mut ManagerState,
        request: &Request,
        payload: &ResponsePayload,
        effects: &mut Effects,
    ) -> Vec<Request> {
        let response = Response::redirect(request, payload);
        request.set_response(response.clone());
        state.forget(request);

        debug!(
            request_id = %request.request_id(),
            status = payload.status,
            url = %request.url(),
            "Request redirected"
        );

        effects.events.push(NetworkEvent::Response(response));
        effects
            .events
            .push(NetworkEvent::RequestFinished(request.clone()));

        let mut chain = request.redirect_chain().to_vec();
        chain.push(request.clone());
        chain
    }

    // ========================================================================
    // Direct Feed
    // ========================================================================

    fn on_request_will_be_sent(&self, state: &mut ManagerState, event: RequestWillBeSent) -> Effects {
        let mut effects = Effects::default();

        let mut redirect_chain = Vec::new();
        let mut awaited_interception = None;
        if let Some(redirect) = &event.redirect_response {
            if let Some(previous) = state.requests.get(&event.request_id).cloned() {
                if state.protocol_request_interception {
                    awaited_interception = previous.interception_id().cloned();
                }
                redirect_chain = Self::close_out_redirect(state, &previous, redirect, &mut effects);
            } else if let Some(handoff) = state.redirect_handoffs.remove(&event.request_id) {
                self.open(
                    state,
                    &event,
                    Some(handoff.interception_id),
                    handoff.redirect_chain,
                    &mut effects,
                );
                return effects;
            }
        }

        let hash = (state.protocol_request_interception && !event.request.url.starts_with("data:"))
            .then(|| RequestHash::of(&event.request));
        let Some(hash) = hash else {
            self.open(state, &event, None, redirect_chain, &mut effects);
            return effects;
        };

        if let Some(interception_id) = state.correlation.take_interception(&hash) {
            self.open(state, &event, Some(interception_id), redirect_chain, &mut effects);
            return effects;
        }

        let parked = ParkedRequest {
            event: Box::new(event),
            redirect_chain,
        };
        match awaited_interception {
            Some(interception_id) => {
                trace!(
                    request_id = %parked.event.request_id,
                    interception_id = %interception_id,
                    "Redirect parked until the intercepted hop redirects"
                );
                state.redirect_destinations.insert(interception_id, parked);
            }
            None => {
                trace!(request_id = %parked.event.request_id, "Request parked until intercepted");
                state.correlation.park_request(hash, parked);
            }
        }

        effects
    }

    fn on_response_received(state: &ManagerState, event: &ResponseReceived) -> Effects {
        let mut effects = Effects::default();

        if let Some(request) = state.requests.get(&event.request_id) {
            let response = Response::new(request, &event.response);
            request.set_response(response.clone());
            effects.events.push(NetworkEvent::Response(response));
        }

        effects
    }

    fn on_loading_finished(state: &mut ManagerState, event: &LoadingFinished) -> Effects {
        let mut effects = Effects::default();

        let Some(request) = state.requests.get(&event.request_id).cloned() else {
            Self::discard_unknown(state, &event.request_id);
            return effects;
        };

        state.forget(&request);
        request.finish();
        effects.events.push(NetworkEvent::RequestFinished(request));
        effects
    }

    fn on_loading_failed(state: &mut ManagerState, event: &LoadingFailed) -> Effects {
        let mut effects = Effects::default();

        let Some(request) = state.requests.get(&event.request_id).cloned() else {
            Self::discard_unknown(state, &event.request_id);
            return effects;
        };

        state.forget(&request);
        request.fail(&event.error_text);
        debug!(
            request_id = %event.request_id,
            error = %event.error_text,
            canceled = event.canceled,
            "Request failed"
        );
        effects.events.push(NetworkEvent::RequestFailed(request));
        effects
    }

    fn on_served_from_cache(state: &ManagerState, event: &RequestServedFromCache) {
        if let Some(request) = state.requests.get(&event.request_id) {
            request.mark_served_from_cache();
        }
    }

    fn discard_unknown(state: &mut ManagerState, request_id: &RequestId) {
        let parked = state
            .correlation
            .discard_request(|parked| parked.event.request_id == *request_id);
        state.redirect_handoffs.remove(request_id);
        state
            .redirect_destinations
            .retain(|_, parked| parked.event.request_id != *request_id);
        trace!(
            request_id = %request_id,
            discarded = parked.is_some(),
            "Terminal event for unknown request ignored"
        );
    }

    // ========================================================================
    // Interception Feed
    // ========================================================================

    fn on_request_intercepted(&self, state: &mut ManagerState, event: RequestIntercepted) -> Effects {
        let mut effects = Effects::default();
        let interception_id = event.interception_id.clone();

        if let Some(challenge) = &event.auth_challenge {
            let answer = if state.attempted_authentications.contains(&interception_id) {
                AuthChallengeResponse {
                    response: AuthResponse::CancelAuth,
                    username: None,
                    password: None,
                }
            } else if let Some(credentials) = state.credentials.clone() {
                state
                    .attempted_authentications
                    .insert(interception_id.clone());
                AuthChallengeResponse {
                    response: AuthResponse::ProvideCredentials,
                    username: Some(credentials.username),
                    password: Some(credentials.password),
                }
            } else {
                AuthChallengeResponse {
                    response: AuthResponse::Default,
                    username: None,
                    password: None,
                }
            };

            debug!(
                interception_id = %interception_id,
                origin = %challenge.origin,
                response = ?answer.response,
                "Answering auth challenge"
            );

            effects.commands.push(
                NetworkCommand::ContinueInterceptedRequest {
                    interception_id,
                    error_reason: None,
                    raw_response: None,
                    url: None,
                    method: None,
                    post_data: None,
                    headers: None,
                    auth_challenge_response: Some(answer),
                }
                .into(),
            );
            return effects;
        }

        if event.redirect_url.is_some() {
            self.on_intercepted_redirect(state, &event, &mut effects);
            return effects;
        }

        if !state.protocol_request_interception {
            effects
                .commands
                .push(NetworkCommand::continue_intercepted(interception_id).into());
            return effects;
        }

        if !state.user_request_interception {
            effects
                .commands
                .push(NetworkCommand::continue_intercepted(interception_id.clone()).into());
        }

        let hash = RequestHash::of(&event.request);
        let parked = match state.correlation.take_request(&hash) {
            Some(parked) => Some(parked),
            None => state.take_redirect_destination(&hash),
        };
        match parked {
            Some(parked) => self.open(
                state,
                &parked.event,
                Some(interception_id),
                parked.redirect_chain,
                &mut effects,
            ),
            None => {
                trace!(interception_id = %interception_id, "Interception parked until requested");
                state.correlation.park_interception(hash, interception_id);
            }
        }

        effects
    }

    /// Handles a paused redirect response.
    ///
    /// The destination hop keeps the interceptionId; it stays paused for the
    /// caller when caller-driven interception is on.
    fn on_intercepted_redirect(
        &self,
        state: &mut ManagerState,
        event: &RequestIntercepted,
        effects: &mut Effects,
    ) {
        let interception_id = event.interception_id.clone();
        let mut paused = state.user_request_interception;

        if let Some(previous) = state.intercepted.get(&interception_id).cloned() {
            let status = event.response_status_code.unwrap_or_default();
            let payload = ResponsePayload {
                url: previous.url().to_string(),
                status,
                status_text: status_text(status).to_string(),
                headers: event.response_headers.clone().unwrap_or_default(),
                ..ResponsePayload::default()
            };
            let redirect_chain = Self::close_out_redirect(state, &previous, &payload, effects);
            state.redirect_handoffs.insert(
                previous.request_id().clone(),
                RedirectHandoff {
                    redirect_chain,
                    interception_id: interception_id.clone(),
                    paused,
                },
            );
        } else if let Some(parked) = state.redirect_destinations.remove(&interception_id) {
            self.open(
                state,
                &parked.event,
                Some(interception_id.clone()),
                parked.redirect_chain,
                effects,
            );
        } else {
            debug!(interception_id = %interception_id, "Redirect for unknown interception");
            paused = false;
        }

        if !paused {
            effects
                .commands
                .push(NetworkCommand::continue_intercepted(interception_id).into());
        }
    }

    /// Releases every parked half after interception was switched off.
    fn flush_parked(&self, state: &mut ManagerState, effects: &mut Effects) {
        let destinations: Vec<ParkedRequest> = state
            .redirect_destinations
            .drain()
            .map(|(_, parked)| parked)
            .collect();
        for parked in state.correlation.drain_requests().into_iter().chain(destinations) {
            self.open(state, &parked.event, None, parked.redirect_chain, effects);
        }
        for interception_id in state.correlation.drain_interceptions() {
            effects
                .commands
                .push(NetworkCommand::continue_intercepted(interception_id).into());
        }
        for handoff in state.redirect_handoffs.values_mut() {
            if handoff.paused {
                handoff.paused = false;
                effects
                    .commands
                    .push(NetworkCommand::continue_intercepted(handoff.interception_id.clone()).into());
            }
        }
    }
}

// ============================================================================
// NetworkManager
// ============================================================================

/// Tracks requests of one scope and exposes request interception.
///
/// # Example
///
/// ```ignore
/// let manager = NetworkManager::new(Arc::new(session.clone()));
/// let mut events = manager.subscribe();
/// manager.initialize().await?;
/// manager.set_request_interception(true).await?;
///
/// while let Some(event) = events.recv().await {
///     if let NetworkEvent::Request(request) = event {
///         request.continue_request(ContinueOverrides::new()).await?;
///     }
/// }
/// ```
pub struct NetworkManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("NetworkManager")
            .field("inflight", &state.requests.len())
            .field("interception", &state.protocol_request_interception)
            .finish_non_exhaustive()
    }
}

impl NetworkManager {
    /// Creates a manager listening on `channel`'s network events.
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        let inner = Arc::new(ManagerInner {
            channel,
            state: Mutex::new(ManagerState::default()),
            subscribers: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        });

        let listeners = NETWORK_EVENTS
            .into_iter()
            .map(|method| {
                let weak = Arc::downgrade(&inner);
                let handler: EventHandler = Arc::new(move |params: &Value| {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle(method, params);
                    }
                });
                inner.channel.events().on(method, handler)
            })
            .collect();
        *inner.listeners.lock() = listeners;

        Self { inner }
    }

    /// Enables the network domain.
    ///
    /// # Errors
    ///
    /// Returns any error from `Network.enable`.
    pub async fn initialize(&self) -> Result<()> {
        self.inner
            .channel
            .execute(NetworkCommand::Enable.into())
            .await?;
        Ok(())
    }

    /// Returns a receiver of every subsequent [`NetworkEvent`], in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<NetworkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Sets or clears HTTP authentication credentials.
    ///
    /// # Errors
    ///
    /// Returns any error from updating interception.
    pub async fn authenticate(&self, credentials: Option<Credentials>) -> Result<()> {
        self.inner.state.lock().credentials = credentials;
        self.update_protocol_request_interception().await
    }

    /// Sets headers sent with every request. Names are lower-cased.
    ///
    /// # Errors
    ///
    /// Returns any error from `Network.setExtraHTTPHeaders`.
    pub async fn set_extra_http_headers(&self, headers: Headers) -> Result<()> {
        let headers: Headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        self.inner.state.lock().extra_headers = headers.clone();

        self.inner
            .channel
            .execute(NetworkCommand::SetExtraHttpHeaders { headers }.into())
            .await?;
        Ok(())
    }

    /// Returns the configured extra headers.
    #[must_use]
    pub fn extra_http_headers(&self) -> Headers {
        self.inner.state.lock().extra_headers.clone()
    }

    /// Emulates losing (or regaining) connectivity.
    ///
    /// Does nothing if the mode is unchanged.
    ///
    /// # Errors
    ///
    /// Returns any error from `Network.emulateNetworkConditions`.
    pub async fn set_offline_mode(&self, offline: bool) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.offline == offline {
                return Ok(());
            }
            state.offline = offline;
        }

        let command = NetworkCommand::EmulateNetworkConditions {
            offline,
            latency: 0.0,
            download_throughput: -1.0,
            upload_throughput: -1.0,
        };
        self.inner.channel.execute(command.into()).await?;
        Ok(())
    }

    /// Overrides the user agent.
    ///
    /// # Errors
    ///
    /// Returns any error from `Network.setUserAgentOverride`.
    pub async fn set_user_agent(&self, user_agent: impl Into<String>) -> Result<()> {
        let command = NetworkCommand::SetUserAgentOverride {
            user_agent: user_agent.into(),
        };
        self.inner.channel.execute(command.into()).await?;
        Ok(())
    }

    /// Enables or disables the HTTP cache.
    ///
    /// The cache stays disabled while interception is on.
    ///
    /// # Errors
    ///
    /// Returns any error from `Network.setCacheDisabled`.
    pub async fn set_cache_enabled(&self, enabled: bool) -> Result<()> {
        let cache_disabled = {
            let mut state = self.inner.state.lock();
            state.user_cache_disabled = !enabled;
            state.user_cache_disabled || state.protocol_request_interception
        };

        self.inner
            .channel
            .execute(NetworkCommand::SetCacheDisabled { cache_disabled }.into())
            .await?;
        Ok(())
    }

    /// Enables or disables caller-driven request interception.
    ///
    /// While enabled, every request must be continued, fulfilled or aborted.
    ///
    /// # Errors
    ///
    /// Returns any error from updating interception.
    pub async fn set_request_interception(&self, enabled: bool) -> Result<()> {
        self.inner.state.lock().user_request_interception = enabled;
        self.update_protocol_request_interception().await
    }

    /// Returns `true` if the browser is pausing requests.
    #[must_use]
    pub fn is_interception_enabled(&self) -> bool {
        self.inner.state.lock().protocol_request_interception
    }

    /// Returns the number of live requests.
    #[must_use]
    pub fn inflight_count(&self) -> usize {
        self.inner.state.lock().requests.len()
    }

    /// Returns the live request with `request_id`.
    #[must_use]
    pub fn request(&self, request_id: &RequestId) -> Option<Request> {
        self.inner.state.lock().requests.get(request_id).cloned()
    }

    async fn update_protocol_request_interception(&self) -> Result<()> {
        let (enabled, cache_disabled) = {
            let mut state = self.inner.state.lock();
            let enabled = state.user_request_interception || state.credentials.is_some();
            if enabled == state.protocol_request_interception {
                return Ok(());
            }
            state.protocol_request_interception = enabled;

            let mut effects = Effects::default();
            if !enabled {
                self.inner.flush_parked(&mut state, &mut effects);
            }
            let cache_disabled = state.user_cache_disabled || enabled;
            self.inner.apply(state, effects);
            (enabled, cache_disabled)
        };

        debug!(enabled, "Request interception toggled");

        let patterns = if enabled {
            vec![RequestPattern::all()]
        } else {
            Vec::new()
        };

        tokio::try_join!(
            self.inner
                .channel
                .execute(NetworkCommand::SetCacheDisabled { cache_disabled }.into()),
            self.inner
                .channel
                .execute(NetworkCommand::SetRequestInterception { patterns }.into()),
        )?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
