pub mod bearer;
pub mod engine;
pub mod factory;
pub mod jwks;
pub mod outcome;
pub mod strategy;

pub use engine::VerificationEngine;
pub use factory::build_verification_engine;
pub use outcome::{Claims, Rejection, StrategyKind, VerificationOutcome, VerifiedClaims};
