//! Application view state machine.
//!
//! Drives which of the four views the application is in and which
//! operations are valid there. The machine itself is pure: firing an
//! event returns the side effects the caller must execute (stopping
//! tracks, clearing the chunk buffer, clearing the transcoder log).

use serde::{Deserialize, Serialize};

/// Current application view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    /// Waiting for the transcoder collaborator to load
    #[default]
    Init,
    /// Ready to compose and record
    Ready,
    /// A recording has been captured and awaits transcoding
    Captured,
    /// The recording has been converted to an animated image
    Converted,
}

/// Events that drive view transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// The transcoder finished loading and is ready for use
    TranscoderLoaded,
    /// The user stopped an active capture
    CaptureStopped,
    /// Transcoding finished successfully
    TranscodeComplete,
    /// The user discarded the current take
    Restart,
}

/// Side effects the caller must execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Stop all live source and surface tracks
    StopTracks,
    /// Clear the chunk buffer
    ClearChunks,
    /// Clear the transcoder log
    ClearLog,
}

/// The view state machine. Initial state is [`ViewState::Init`]; there
/// is no terminal state, `Restart` always returns to `Ready`.
#[derive(Debug, Default)]
pub struct ViewStateMachine {
    state: ViewState,
}

impl ViewStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Apply an event. Events that are not valid in the current state
    /// are defensive no-ops: the state is unchanged and no effects are
    /// returned.
    pub fn fire(&mut self, event: ViewEvent) -> &'static [SideEffect] {
        use SideEffect::*;
        use ViewEvent::*;
        use ViewState::*;

        let (next, effects): (ViewState, &'static [SideEffect]) = match (self.state, event) {
            (Init, TranscoderLoaded) => (Ready, &[]),
            (Ready, CaptureStopped) => (Captured, &[StopTracks]),
            (Captured, TranscodeComplete) => (Converted, &[ClearChunks]),
            (Captured, Restart) => (Ready, &[ClearChunks, ClearLog]),
            (Converted, Restart) => (Ready, &[]),
            (state, _) => (state, &[]),
        };
        self.state = next;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_capture_convert_cycle() {
        let mut machine = ViewStateMachine::new();
        assert_eq!(machine.state(), ViewState::Init);

        assert!(machine.fire(ViewEvent::TranscoderLoaded).is_empty());
        assert_eq!(machine.state(), ViewState::Ready);

        assert_eq!(
            machine.fire(ViewEvent::CaptureStopped),
            &[SideEffect::StopTracks]
        );
        assert_eq!(machine.state(), ViewState::Captured);

        assert_eq!(
            machine.fire(ViewEvent::TranscodeComplete),
            &[SideEffect::ClearChunks]
        );
        assert_eq!(machine.state(), ViewState::Converted);

        assert!(machine.fire(ViewEvent::Restart).is_empty());
        assert_eq!(machine.state(), ViewState::Ready);
    }

    #[test]
    fn restart_from_captured_clears_chunks_and_log() {
        let mut machine = ViewStateMachine::new();
        machine.fire(ViewEvent::TranscoderLoaded);
        machine.fire(ViewEvent::CaptureStopped);

        let effects = machine.fire(ViewEvent::Restart);
        assert_eq!(effects, &[SideEffect::ClearChunks, SideEffect::ClearLog]);
        assert_eq!(machine.state(), ViewState::Ready);
    }

    #[test]
    fn invalid_events_are_no_ops() {
        let mut machine = ViewStateMachine::new();

        assert!(machine.fire(ViewEvent::CaptureStopped).is_empty());
        assert_eq!(machine.state(), ViewState::Init);

        machine.fire(ViewEvent::TranscoderLoaded);
        assert!(machine.fire(ViewEvent::TranscodeComplete).is_empty());
        assert_eq!(machine.state(), ViewState::Ready);

        assert!(machine.fire(ViewEvent::TranscoderLoaded).is_empty());
        assert_eq!(machine.state(), ViewState::Ready);
    }
}
