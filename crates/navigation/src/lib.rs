//! Survey navigation: branch resolution, the per-respondent traversal state
//! machine, required-answer gating, submission packaging and delivery.

pub mod engine;
pub mod packager;
pub mod presenter;
pub mod resolver;
pub mod session;
pub mod state_machine;
pub mod submission;
pub mod types;
pub mod validation;

pub use engine::SessionEngine;
pub use packager::{BatchSubmission, SubmissionPackager};
pub use presenter::{Screen, SubmissionSummary};
pub use resolver::BranchResolver;
pub use session::NavigationSession;
pub use state_machine::NavigationStateMachine;
pub use submission::{HttpTransport, SubmissionError, SubmissionTransport, Submitter};
pub use types::{NavigationError, NavigationPhase, NavigationState, StepOutcome};
pub use validation::ValidationGate;
