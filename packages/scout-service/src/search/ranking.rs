pub mod bias;
pub mod fusion;
pub mod signals;
pub mod weights;

pub use bias::{AuditDimension, BiasPolicy, BiasWarning, BiasWarningKind};
pub use fusion::FusedCandidate;
pub use signals::{CandidateSignals, QueryTerms, SignalContext};
pub use weights::ResolvedWeights;
