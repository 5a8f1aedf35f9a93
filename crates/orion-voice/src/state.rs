use crate::sdk::AgentMode;
use serde::{Deserialize, Serialize};

/// Lifecycle of the voice session.
///
/// `Idle -> Connecting -> Listening <-> Speaking -> Idle`, with `Error`
/// reachable from anywhere and left again only through [`Transition::Reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    /// No session, no microphone.
    #[default]
    Idle,
    /// Microphone, config and prompt are being acquired.
    Connecting,
    /// Connected, agent waiting for speech.
    Listening,
    /// Connected, agent talking.
    Speaking,
    /// A failure is being cleaned up.
    Error,
}

/// Inputs to the voice state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The user asked to start.
    Start,
    /// The SDK reported the session live.
    SdkConnected,
    /// The SDK reported a mode change.
    Mode(AgentMode),
    /// Something failed.
    Fail,
    /// Explicit stop, panel close, remote hang-up, or end of error cleanup.
    Reset,
}

impl VoiceState {
    /// The state `transition` leads to, or `None` if it does not apply here.
    pub fn next(self, transition: Transition) -> Option<VoiceState> {
        use VoiceState::*;
        match (self, transition) {
            (Idle, Transition::Start) => Some(Connecting),
            (Connecting, Transition::SdkConnected) => Some(Listening),
            (Listening | Speaking, Transition::Mode(AgentMode::Speaking)) => Some(Speaking),
            (Listening | Speaking, Transition::Mode(AgentMode::Listening)) => Some(Listening),
            (_, Transition::Fail) => Some(Error),
            (_, Transition::Reset) => Some(Idle),
            _ => None,
        }
    }

    /// A remote session is live.
    pub fn is_connected(self) -> bool {
        matches!(self, VoiceState::Listening | VoiceState::Speaking)
    }

    /// Start requests are ignored in this state.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            VoiceState::Connecting | VoiceState::Listening | VoiceState::Speaking
        )
    }
}

impl std::fmt::Display for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VoiceState::Idle => "idle",
            VoiceState::Connecting => "connecting",
            VoiceState::Listening => "listening",
            VoiceState::Speaking => "speaking",
            VoiceState::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let s = VoiceState::Idle;
        let s = s.next(Transition::Start).unwrap_or(s);
        assert_eq!(s, VoiceState::Connecting);
        let s = s.next(Transition::SdkConnected).unwrap_or(s);
        assert_eq!(s, VoiceState::Listening);
        let s = s.next(Transition::Mode(AgentMode::Speaking)).unwrap_or(s);
        assert_eq!(s, VoiceState::Speaking);
        let s = s.next(Transition::Mode(AgentMode::Listening)).unwrap_or(s);
        assert_eq!(s, VoiceState::Listening);
        assert_eq!(s.next(Transition::Reset), Some(VoiceState::Idle));
    }

    #[test]
    fn test_error_reachable_everywhere() {
        for s in [
            VoiceState::Idle,
            VoiceState::Connecting,
            VoiceState::Listening,
            VoiceState::Speaking,
            VoiceState::Error,
        ] {
            assert_eq!(s.next(Transition::Fail), Some(VoiceState::Error));
            assert_eq!(s.next(Transition::Reset), Some(VoiceState::Idle));
        }
    }

    #[test]
    fn test_ignored_transitions() {
        assert_eq!(VoiceState::Connecting.next(Transition::Start), None);
        assert_eq!(VoiceState::Listening.next(Transition::Start), None);
        assert_eq!(VoiceState::Error.next(Transition::Start), None);
        assert_eq!(VoiceState::Idle.next(Transition::SdkConnected), None);
        assert_eq!(
            VoiceState::Connecting.next(Transition::Mode(AgentMode::Speaking)),
            None
        );
    }

    #[test]
    fn test_busy_and_connected() {
        assert!(!VoiceState::Idle.is_busy());
        assert!(VoiceState::Connecting.is_busy());
        assert!(!VoiceState::Connecting.is_connected());
        assert!(VoiceState::Speaking.is_connected());
        assert!(!VoiceState::Error.is_busy());
    }
}
