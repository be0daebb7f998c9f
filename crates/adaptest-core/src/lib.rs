//! adaptest-core — IRT ability estimation, item selection, and the
//! diagnostic session engine.
//!
//! This crate defines the data model, the 3PL item functions, the
//! estimator/selector pair, the session state machine, and the coverage and
//! readiness reporting that the rest of adaptest builds on.

pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod selector;
pub mod session;
pub mod traits;

pub use engine::{AnswerOutcome, DiagnosticEngine, NextStep, StartedSession};
pub use error::{ItemParameterError, RepositoryError, SessionError};
