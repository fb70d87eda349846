pub mod engine;
pub mod executor;
pub mod feedback;
pub mod hints;
pub mod pattern;
pub mod prediction;
pub mod quality;
pub mod requirements;
pub mod safety;
pub mod scoring;
pub mod session;
pub mod syntax;
pub mod validator;


pub use executor::Executor;
pub use safety::check_safety;
pub use session::ChallengeSession;
pub use validator::{ExpectedOutput, Validator};
