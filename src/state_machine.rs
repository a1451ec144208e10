//! Core session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
mod log;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use log::{LogError, SessionLog};
pub use state::{ConvState, SessionContext};
pub use transition::{transition, TransitionError};
