//! The conversation state machine.
//!
//! [`transition`] is the authoritative decision table: given the current
//! state, one normalized event and the user's directory profile, it returns
//! the next state and the actions to perform. It is pure so every branch is
//! unit-testable without I/O. [`Engine`] executes those actions against the
//! gateway, directory, token bridge and dispatcher, serialized per user id.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::channel::MessagingGateway;
use crate::directory::{UserDirectory, UserProfile};
use crate::dispatch::{CancelRegistry, ExerciseDispatcher};
use crate::session::store::SessionStore;
use crate::session::{ConversationState, Phase};
use crate::texts;
use crate::token::TokenBridge;
use crate::types::{Button, DispatchReport, EventKind, Language, MuscleGroup, NormalizedEvent};
use crate::vocab;

/// One thing the engine must do as a result of a transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendText(String),
    SendButtons {
        body: String,
        buttons: Vec<Button>,
    },
    /// Persist the user's language choice to the directory.
    PersistLanguage(Language),
    /// Persist a completed registration to the directory.
    PersistRegistration {
        name: String,
        email: String,
        language: Language,
    },
    /// Mint a login token and message the user the login URL.
    SendLoginLink,
    /// Kick off an exercise batch for the canonical group.
    StartDispatch(MuscleGroup),
}

/// Result of one transition: the state to store (`None` clears the session)
/// and the actions to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Option<ConversationState>,
    pub actions: Vec<Action>,
}

impl Transition {
    fn stay(state: ConversationState, actions: Vec<Action>) -> Self {
        Self {
            next: Some(state),
            actions,
        }
    }

    fn clear(actions: Vec<Action>) -> Self {
        Self {
            next: None,
            actions,
        }
    }
}

/// The language everything falls back to before one is chosen.
const DEFAULT_LANG: Language = Language::En;

fn effective_language(state: &ConversationState, profile: Option<&UserProfile>) -> Language {
    state
        .language
        .or(profile.and_then(|p| p.language))
        .unwrap_or(DEFAULT_LANG)
}

/// Seed a fresh state for a user with no live session: returning users start
/// idle in their stored language, everyone else starts at language selection.
pub fn seed_state(user_id: &str, profile: Option<&UserProfile>) -> ConversationState {
    match profile.and_then(|p| p.language) {
        Some(lang) => ConversationState::idle(user_id, Some(lang)),
        None => ConversationState::new(user_id, Phase::AwaitingLanguage),
    }
}

fn language_menu() -> Action {
    Action::SendButtons {
        body: texts::language_prompt().to_string(),
        buttons: texts::language_buttons(),
    }
}

fn welcome_back_menu(lang: Language) -> Action {
    Action::SendButtons {
        body: texts::welcome_back(lang).to_string(),
        buttons: texts::registration_buttons(lang),
    }
}

fn what_next_menu(lang: Language) -> Action {
    Action::SendButtons {
        body: texts::what_next(lang).to_string(),
        buttons: texts::what_next_buttons(lang),
    }
}

/// Re-prompt for whatever the current phase expects.
fn phase_reprompt(state: &ConversationState, lang: Language) -> Action {
    match state.phase {
        Phase::AwaitingLanguage => language_menu(),
        Phase::AwaitingRegistrationChoice => welcome_back_menu(lang),
        Phase::AwaitingName => Action::SendText(texts::name_prompt(lang).to_string()),
        Phase::AwaitingEmail => Action::SendText(texts::email_prompt(lang).to_string()),
        Phase::AwaitingMuscleGroup => Action::SendText(texts::muscle_menu(lang)),
        Phase::AwaitingMenuChoice => what_next_menu(lang),
        Phase::Idle => Action::SendText(texts::generic_reprompt(lang).to_string()),
    }
}

/// The authoritative transition function.
///
/// Global overrides (greeting, tracker, logout) are checked first in every
/// phase; phase-specific handling only applies once they are exhausted.
/// Every event produces at least one action — nothing fails silently.
pub fn transition(
    state: &ConversationState,
    event: &NormalizedEvent,
    profile: Option<&UserProfile>,
) -> Transition {
    let lang = effective_language(state, profile);

    // ---- Global overrides, any phase ----
    if let EventKind::Text { body } = &event.kind {
        if vocab::is_greeting(body) {
            return greeting_reset(&event.user_id, profile);
        }
        if vocab::is_tracker_keyword(body) {
            return Transition::clear(vec![Action::SendLoginLink]);
        }
        if vocab::is_logout_keyword(body) {
            return Transition::clear(vec![Action::SendText(texts::farewell(lang).to_string())]);
        }
    }
    if let EventKind::ButtonChoice { id } = &event.kind {
        match id.as_str() {
            "log_out" => {
                return Transition::clear(vec![Action::SendText(
                    texts::farewell(lang).to_string(),
                )]);
            }
            "view_web" => return Transition::clear(vec![Action::SendLoginLink]),
            _ => {}
        }
    }

    // ---- Phase-specific handling ----
    match (state.phase, &event.kind) {
        (Phase::AwaitingLanguage, EventKind::ButtonChoice { id })
            if id == "lang_en" || id == "lang_es" =>
        {
            let chosen = if id == "lang_en" {
                Language::En
            } else {
                Language::Es
            };
            let next =
                ConversationState::new(&state.user_id, Phase::AwaitingName).with_language(chosen);
            Transition::stay(
                next,
                vec![
                    Action::PersistLanguage(chosen),
                    Action::SendText(texts::name_prompt(chosen).to_string()),
                ],
            )
        }

        (Phase::AwaitingRegistrationChoice, EventKind::ButtonChoice { id })
            if id == "continue" =>
        {
            let mut next = state.clone();
            next.phase = Phase::AwaitingMuscleGroup;
            Transition::stay(next, vec![Action::SendText(texts::muscle_menu(lang))])
        }

        (Phase::AwaitingRegistrationChoice, EventKind::ButtonChoice { id })
            if id == "re_register" =>
        {
            let next = ConversationState::new(&state.user_id, Phase::AwaitingLanguage);
            Transition::stay(next, vec![language_menu()])
        }

        (Phase::AwaitingName, EventKind::Text { body }) => {
            let mut next = state.clone();
            next.phase = Phase::AwaitingEmail;
            next.draft_name = Some(body.trim().to_string());
            Transition::stay(
                next,
                vec![Action::SendText(texts::email_prompt(lang).to_string())],
            )
        }

        (Phase::AwaitingEmail, EventKind::Text { body }) => match &state.draft_name {
            Some(name) => {
                let mut next = state.clone();
                next.phase = Phase::AwaitingMuscleGroup;
                next.draft_name = None;
                Transition::stay(
                    next,
                    vec![
                        Action::PersistRegistration {
                            name: name.clone(),
                            email: body.trim().to_string(),
                            language: lang,
                        },
                        Action::SendText(texts::registered_confirmation(lang)),
                    ],
                )
            }
            // Stale state lost the draft name; back up one step instead of
            // registering a nameless user.
            None => {
                let mut next = state.clone();
                next.phase = Phase::AwaitingName;
                Transition::stay(
                    next,
                    vec![Action::SendText(texts::name_prompt(lang).to_string())],
                )
            }
        },

        (Phase::AwaitingMuscleGroup, EventKind::Text { body }) => {
            match vocab::match_muscle_group(body) {
                Some(group) => {
                    let mut next = state.clone();
                    next.phase = Phase::AwaitingMenuChoice;
                    next.selected_muscle_group = Some(group);
                    Transition::stay(next, vec![Action::StartDispatch(group)])
                }
                None => Transition::stay(
                    state.clone(),
                    vec![Action::SendText(texts::invalid_muscle(lang))],
                ),
            }
        }

        (Phase::AwaitingMenuChoice | Phase::Idle, EventKind::ButtonChoice { id })
            if id == "start_over" =>
        {
            let mut next = state.clone();
            next.phase = Phase::AwaitingMuscleGroup;
            next.selected_muscle_group = None;
            Transition::stay(next, vec![Action::SendText(texts::muscle_menu(lang))])
        }

        // Anything else: no phase change, re-prompt for what we expected.
        _ => Transition::stay(state.clone(), vec![phase_reprompt(state, lang)]),
    }
}

fn greeting_reset(user_id: &str, profile: Option<&UserProfile>) -> Transition {
    match profile {
        Some(p) if p.is_returning() => {
            let lang = p.language.unwrap_or(DEFAULT_LANG);
            let next = ConversationState::new(user_id, Phase::AwaitingRegistrationChoice)
                .with_language(lang);
            Transition::stay(next, vec![welcome_back_menu(lang)])
        }
        _ => {
            let next = ConversationState::new(user_id, Phase::AwaitingLanguage);
            Transition::stay(next, vec![language_menu()])
        }
    }
}

/// Executes transitions: wires the pure state machine to the session store,
/// directory, gateway, token bridge and dispatcher.
pub struct Engine {
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    gateway: Arc<dyn MessagingGateway>,
    bridge: Arc<TokenBridge>,
    dispatcher: Arc<ExerciseDispatcher>,
    cancels: CancelRegistry,
    locks: DashMap<String, Arc<Mutex<()>>>,
    login_base_url: String,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn MessagingGateway>,
        bridge: Arc<TokenBridge>,
        dispatcher: Arc<ExerciseDispatcher>,
        cancels: CancelRegistry,
        login_base_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            directory,
            gateway,
            bridge,
            dispatcher,
            cancels,
            locks: DashMap::new(),
            login_base_url: login_base_url.into(),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one inbound event to completion, except for the exercise
    /// batch, which runs as its own task (its handle is returned so callers
    /// that care — tests, mostly — can await the report).
    ///
    /// Events for the same user are serialized so duplicate webhook
    /// deliveries cannot interleave and corrupt the phase.
    pub async fn handle_event(
        &self,
        event: NormalizedEvent,
    ) -> Option<JoinHandle<DispatchReport>> {
        self.sessions.evict_idle();

        let lock = self.user_lock(&event.user_id);
        let _guard = lock.lock().await;

        let profile = match self.directory.get(&event.user_id) {
            Ok(profile) => profile,
            Err(e) => {
                // Directory down: keep the conversation alive, never bubble
                // up to the webhook caller.
                warn!("User directory unavailable for {}: {}", event.user_id, e);
                let lang = self
                    .sessions
                    .get(&event.user_id)
                    .and_then(|s| s.language)
                    .unwrap_or(DEFAULT_LANG);
                let _ = self
                    .gateway
                    .send_text(&event.user_id, texts::generic_reprompt(lang))
                    .await;
                return None;
            }
        };

        let state = self
            .sessions
            .get(&event.user_id)
            .unwrap_or_else(|| seed_state(&event.user_id, profile.as_ref()));
        let lang = effective_language(&state, profile.as_ref());

        let result = transition(&state, &event, profile.as_ref());

        let mut dispatch_job = None;
        for action in result.actions {
            match action {
                Action::SendText(body) => {
                    if let Err(e) = self.gateway.send_text(&event.user_id, &body).await {
                        warn!("Failed to send text to {}: {}", event.user_id, e);
                    }
                }
                Action::SendButtons { body, buttons } => {
                    if let Err(e) = self
                        .gateway
                        .send_buttons(&event.user_id, &body, &buttons)
                        .await
                    {
                        warn!("Failed to send buttons to {}: {}", event.user_id, e);
                    }
                }
                Action::PersistLanguage(language) => {
                    if let Err(e) = self.directory.upsert_language(&event.user_id, language) {
                        warn!("Failed to persist language for {}: {}", event.user_id, e);
                    }
                }
                Action::PersistRegistration {
                    name,
                    email,
                    language,
                } => {
                    if let Err(e) =
                        self.directory
                            .upsert_registration(&event.user_id, &name, &email, language)
                    {
                        warn!("Failed to persist registration for {}: {}", event.user_id, e);
                    } else {
                        info!("User {} registered", event.user_id);
                    }
                }
                Action::SendLoginLink => self.send_login_link(&event.user_id, lang).await,
                Action::StartDispatch(group) => {
                    let dispatcher = self.dispatcher.clone();
                    let user_id = event.user_id.clone();
                    info!("Dispatching {} exercises to {}", group, user_id);
                    dispatch_job = Some(tokio::spawn(async move {
                        dispatcher.dispatch(&user_id, group, lang).await
                    }));
                }
            }
        }

        match result.next {
            Some(next) => self.sessions.put(next),
            None => {
                // Chat and web are mutually exclusive views of one account:
                // a hand-off or logout leaves no live chat session behind.
                self.sessions.remove(&event.user_id);
                self.cancels.cancel(&event.user_id);
            }
        }

        dispatch_job
    }

    async fn send_login_link(&self, user_id: &str, lang: Language) {
        match self.bridge.issue(user_id) {
            Ok(token) => {
                let url = format!("{}/login/{}", self.login_base_url, token);
                if let Err(e) = self
                    .gateway
                    .send_text(user_id, &texts::tracker_link(lang, &url))
                    .await
                {
                    warn!("Failed to send login link to {}: {}", user_id, e);
                }
                info!("Issued web login link for {}", user_id);
            }
            Err(e) => {
                warn!("Failed to issue login token for {}: {}", user_id, e);
                let _ = self
                    .gateway
                    .send_text(user_id, texts::tracker_error(lang))
                    .await;
            }
        }
    }
}
