/// Role of a candidate in an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElectionState {
    /// No record observed yet.
    #[default]
    Unknown,
    /// Another candidate holds a valid lease.
    Following,
    /// This candidate holds a valid lease.
    Leading,
    /// The elector has shut down.
    Stopped,
}

impl ElectionState {
    /// Convert to string for logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Following => "following",
            Self::Leading => "leading",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_leading(&self) -> bool {
        matches!(self, Self::Leading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ElectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conversion() {
        assert_eq!(ElectionState::default(), ElectionState::Unknown);
        assert_eq!(ElectionState::Leading.as_str(), "leading");
        assert_eq!(ElectionState::Following.to_string(), "following");
    }

    #[test]
    fn test_state_predicates() {
        assert!(ElectionState::Leading.is_leading());
        assert!(!ElectionState::Following.is_leading());
        assert!(ElectionState::Stopped.is_terminal());
        assert!(!ElectionState::Unknown.is_terminal());
    }
}
