//! Validation and results: scorers, trainer-log parsing, the CSV results store.

pub mod results;
pub mod scoring;
pub mod valid_log;
pub mod validator;

pub use results::{ResultRow, ResultsStore};
pub use scoring::Scorer;
pub use validator::{
    ReferenceValidator, ScoreMap, ValidationRequest, ValidationSource, Validator,
    render_output_path,
};
