//! Request lifecycle state machine.

use std::fmt;

/// Position of a session in the request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Session registered, relay connection not yet confirmed
    Created,
    /// Relay connected, waiting for the wallet to scan and handshake
    AwaitingHandshake,
    /// Shared secret agreed, waiting for the user's decision
    Established,
    /// User accepted, wallet is building the proof
    GeneratingProof,
    /// Proof delivered
    Completed,
    /// User declined
    Rejected,
    /// Wallet reported an irrecoverable error
    Failed,
    /// Caller cancelled the request
    Cancelled,
}

impl SessionState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Rejected | Self::Failed | Self::Cancelled
        )
    }

    /// Whether the wallet may still perform the handshake
    pub fn awaits_handshake(&self) -> bool {
        matches!(self, Self::Created | Self::AwaitingHandshake)
    }

    /// Transition table.
    ///
    /// | From | To |
    /// |------|----|
    /// | `Created` | `AwaitingHandshake`, `Established` |
    /// | `AwaitingHandshake` | `Established` |
    /// | `Established` | `GeneratingProof`, `Rejected`, `Completed` |
    /// | `GeneratingProof` | `Completed`, `Rejected` |
    /// | any non-terminal | `Failed`, `Cancelled` |
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Failed | Cancelled) => true,
            (Created, AwaitingHandshake | Established) => true,
            (AwaitingHandshake, Established) => true,
            (Established, GeneratingProof | Rejected | Completed) => true,
            (GeneratingProof, Completed | Rejected) => true,
            _ => false,
        }
    }

    /// Lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingHandshake => "awaiting_handshake",
            Self::Established => "established",
            Self::GeneratingProof => "generating_proof",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use SessionState::*;
        let path = [Created, AwaitingHandshake, Established, GeneratingProof, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        use SessionState::*;
        for terminal in [Completed, Rejected, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Failed));
            assert!(!terminal.can_transition_to(Cancelled));
            assert!(!terminal.can_transition_to(Established));
        }
    }

    #[test]
    fn test_no_skipping_the_handshake() {
        use SessionState::*;
        assert!(!Created.can_transition_to(GeneratingProof));
        assert!(!AwaitingHandshake.can_transition_to(Completed));
        assert!(!Created.can_transition_to(Rejected));
    }

    #[test]
    fn test_any_live_state_can_fail_or_cancel() {
        use SessionState::*;
        for live in [Created, AwaitingHandshake, Established, GeneratingProof] {
            assert!(live.can_transition_to(Failed));
            assert!(live.can_transition_to(Cancelled));
        }
    }
}
