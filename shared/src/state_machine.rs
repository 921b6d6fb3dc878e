//! Device Control Loop State Machine
//!
//! Defines the valid phase transitions of the device control loop and the
//! brightness transition tracker used by light-triggered LED control.

/// Phases of the device control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Waiting on the command queue
    Idle,
    /// Executing a popped command
    Dispatching,
    /// Checking the brightness sensor after an idle tick
    Polling,
    /// Loop has exited
    Stopped,
}

/// Events that drive the loop between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A command was popped from the queue
    CommandReady,
    /// Command executed and its response delivered
    DispatchComplete,
    /// Idle wait expired
    PollTick,
    /// Sensor check finished
    PollComplete,
    /// Keep-running flag cleared
    StopRequested,
}

/// Result of a phase transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and the phase changed
    Success(LoopPhase),
    /// Transition was invalid from the current phase
    Invalid { from: LoopPhase, event: PhaseEvent },
}

/// The phase machine of the device control loop
#[derive(Debug)]
pub struct LoopStateMachine {
    phase: LoopPhase,
    dispatched: u64,
    polls: u64,
}

impl Default for LoopStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopStateMachine {
    /// Create a new state machine in Idle phase
    pub fn new() -> Self {
        Self {
            phase: LoopPhase::Idle,
            dispatched: 0,
            polls: 0,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Number of commands dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Number of sensor polls performed so far
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: PhaseEvent) -> TransitionResult {
        // Stop is honoured from every phase
        if event == PhaseEvent::StopRequested {
            self.phase = LoopPhase::Stopped;
            return TransitionResult::Success(LoopPhase::Stopped);
        }

        match self.next_phase(event) {
            Some(phase) => {
                match event {
                    PhaseEvent::DispatchComplete => self.dispatched += 1,
                    PhaseEvent::PollComplete => self.polls += 1,
                    _ => {}
                }
                self.phase = phase;
                TransitionResult::Success(phase)
            }
            None => TransitionResult::Invalid {
                from: self.phase,
                event,
            },
        }
    }

    /// Get the next phase for a given event, if the transition is valid
    fn next_phase(&self, event: PhaseEvent) -> Option<LoopPhase> {
        use LoopPhase::*;
        use PhaseEvent::*;

        match (self.phase, event) {
            (Idle, CommandReady) => Some(Dispatching),
            (Idle, PollTick) => Some(Polling),
            (Dispatching, DispatchComplete) => Some(Idle),
            (Polling, PollComplete) => Some(Idle),
            _ => None,
        }
    }
}

/// A change of the sensor reading category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightTransition {
    BecameBright,
    BecameDark,
}

/// Remembers the last brightness category and reports only changes
#[derive(Debug, Default)]
pub struct BrightnessTracker {
    last_bright: bool,
}

impl BrightnessTracker {
    /// Start in the "not bright" category
    pub fn new() -> Self {
        Self { last_bright: false }
    }

    /// Record a reading, returning the transition it causes, if any
    pub fn observe(&mut self, bright: bool) -> Option<LightTransition> {
        if bright == self.last_bright {
            return None;
        }
        self.last_bright = bright;
        Some(if bright {
            LightTransition::BecameBright
        } else {
            LightTransition::BecameDark
        })
    }

    pub fn last_bright(&self) -> bool {
        self.last_bright
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase() {
        let fsm = LoopStateMachine::new();
        assert_eq!(fsm.phase(), LoopPhase::Idle);
    }

    #[test]
    fn test_dispatch_cycle() {
        let mut fsm = LoopStateMachine::new();

        let result = fsm.process_event(PhaseEvent::CommandReady);
        assert_eq!(result, TransitionResult::Success(LoopPhase::Dispatching));

        let result = fsm.process_event(PhaseEvent::DispatchComplete);
        assert_eq!(result, TransitionResult::Success(LoopPhase::Idle));
        assert_eq!(fsm.dispatched(), 1);
    }

    #[test]
    fn test_poll_cycle() {
        let mut fsm = LoopStateMachine::new();

        fsm.process_event(PhaseEvent::PollTick);
        assert_eq!(fsm.phase(), LoopPhase::Polling);

        fsm.process_event(PhaseEvent::PollComplete);
        assert_eq!(fsm.phase(), LoopPhase::Idle);
        assert_eq!(fsm.polls(), 1);
    }

    #[test]
    fn test_no_poll_while_dispatching() {
        let mut fsm = LoopStateMachine::new();
        fsm.process_event(PhaseEvent::CommandReady);

        let result = fsm.process_event(PhaseEvent::PollTick);
        assert!(matches!(
            result,
            TransitionResult::Invalid {
                from: LoopPhase::Dispatching,
                event: PhaseEvent::PollTick
            }
        ));
        assert_eq!(fsm.phase(), LoopPhase::Dispatching);
    }

    #[test]
    fn test_stop_from_any_phase() {
        let mut fsm = LoopStateMachine::new();
        fsm.process_event(PhaseEvent::CommandReady);

        let result = fsm.process_event(PhaseEvent::StopRequested);
        assert_eq!(result, TransitionResult::Success(LoopPhase::Stopped));

        // Nothing leaves Stopped
        let result = fsm.process_event(PhaseEvent::CommandReady);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
    }

    #[test]
    fn test_tracker_reports_edges_only() {
        let mut tracker = BrightnessTracker::new();
        let readings = [false, false, true, true, false];

        let transitions: Vec<_> = readings
            .iter()
            .filter_map(|bright| tracker.observe(*bright))
            .collect();

        assert_eq!(
            transitions,
            vec![LightTransition::BecameBright, LightTransition::BecameDark]
        );
    }

    #[test]
    fn test_tracker_first_bright_reading_is_a_transition() {
        let mut tracker = BrightnessTracker::new();
        assert!(!tracker.last_bright());
        assert_eq!(tracker.observe(true), Some(LightTransition::BecameBright));
        assert!(tracker.last_bright());
    }
}
