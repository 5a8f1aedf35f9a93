//! Voice bridge for the Orion client.
//!
//! Wraps a third-party spoken-dialogue session behind the [`VoiceSdk`] and
//! [`Microphone`] capability traits and drives it through an explicit
//! [`VoiceState`] machine. User utterances that ask for side effects are
//! forwarded over the text channel and their reply is correlated back.
//!
//! # Main types
//!
//! - [`VoiceBridge`] — Owns the voice session, microphone and pending turns.
//! - [`VoiceConfig`] — Timeout, lexicon and marker configuration.
//! - [`IntentClassifier`] — Keyword test for "needs tool execution".
//! - [`MarkerStripper`] — Removes out-of-band control markers from display text.

/// The bridge itself.
pub mod bridge;
/// Action-intent lexicon.
pub mod classify;
/// Bridge configuration.
pub mod config;
/// Reply correlation for forwarded utterances.
pub mod correlate;
/// Control-marker stripping.
pub mod markers;
/// Capability traits for the voice SDK and audio capture.
pub mod sdk;
/// Session state machine.
pub mod state;

pub use bridge::{VoiceBridge, VoiceDeps, VoiceIdentity, VoiceTurn};
pub use classify::IntentClassifier;
pub use config::VoiceConfig;
pub use correlate::{Correlated, TOOL_TIMEOUT_REPLY};
pub use markers::MarkerStripper;
pub use sdk::{
    AgentMode, CaptureStream, Microphone, SessionOverrides, Utterance, VoiceSdk, VoiceSdkEvent,
};
pub use state::{Transition, VoiceState};
