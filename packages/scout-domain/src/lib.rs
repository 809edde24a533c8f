pub mod profile;
pub mod role;
pub mod signal;
pub mod text;
pub mod time_serde;

pub use profile::{
	CandidateFilter, CandidateProfile, CompanyStint, CompanyTier, Seniority, SkillEntry,
};
pub use role::{JobFunction, RoleArchetype};
pub use signal::{RiskTier, Signal, WeightKey};
