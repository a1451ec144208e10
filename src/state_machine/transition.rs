//! Pure state transition function
//!
//! Given the same state and event this always yields the same new state and
//! effect list. All I/O (log mutation, rendering, the completion call) happens
//! in the runtime that executes the effects.

use super::{ConvState, Effect, Event};
use crate::system_prompt::{APOLOGY, EMPTY_INPUT_NOTICE};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is still being generated, wait for it before sending or resetting")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User input
        // ============================================================

        // Idle + blank text -> Idle, canned notice, no completion call
        (ConvState::Idle, Event::UserMessage { text }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_assistant(EMPTY_INPUT_NOTICE))
                .with_effect(Effect::Render))
        }

        // Idle + text -> Processing
        (ConvState::Idle, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(ConvState::Processing)
                .with_effect(Effect::append_user(text.trim()))
                .with_effect(Effect::Render)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::RequestCompletion))
        }

        // Idle + Reset -> Idle, log back to [system, greeting]
        (ConvState::Idle, Event::Reset) => Ok(TransitionResult::new(ConvState::Idle)
            .with_effect(Effect::TruncateToSystem)
            .with_effect(Effect::Render)
            .with_effects(Effect::greeting())),

        // The in-flight call still references the current log
        (ConvState::Processing, Event::UserMessage { .. } | Event::Reset) => {
            Err(TransitionError::Busy)
        }

        // ============================================================
        // Completion outcomes
        // ============================================================
        (ConvState::Processing, Event::CompletionSucceeded { text }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_assistant(text))
                .with_effect(Effect::Render)
                .with_effect(Effect::NotifyState))
        }

        // Every failure looks the same to the user
        (ConvState::Processing, Event::CompletionFailed { .. }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_assistant(APOLOGY))
                .with_effect(Effect::Render)
                .with_effect(Effect::NotifyState))
        }

        (
            ConvState::Idle,
            event @ (Event::CompletionSucceeded { .. } | Event::CompletionFailed { .. }),
        ) => Err(TransitionError::InvalidTransition(format!(
            "{} with no completion in flight",
            event.name()
        ))),
    }
}
