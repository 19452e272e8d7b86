mod identity;
mod leader;
mod state;

pub use identity::CandidateId;
pub use leader::LeaderInfo;
pub use state::ElectionState;
