use uuid::Uuid;

/// Identity of a candidate, unique among concurrently running candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateId(String);

impl CandidateId {
    /// Use an externally supplied identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an identity prefixed with a host name, e.g. `web-1_5f0c...`.
    pub fn for_host(hostname: &str) -> Self {
        Self(format!("{}_{}", hostname, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_id_generation() {
        let id1 = CandidateId::for_host("node-a");
        let id2 = CandidateId::for_host("node-a");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_candidate_id_for_host() {
        let id = CandidateId::for_host("node-a");
        assert!(id.as_str().starts_with("node-a_"));
        assert_eq!(CandidateId::new("fixed").as_str(), "fixed");
    }
}
