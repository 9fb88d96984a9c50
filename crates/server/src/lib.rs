//! quadcast producer library.

pub mod config;
pub mod error;
pub mod field;
pub mod server;
pub mod source;

// Re-export commonly used types
pub use config::{Config, FailurePolicy, SourceKind};
pub use error::{DimensionError, DistributorError, RegistrationError, SourceError};
pub use field::{Field, Physics};
pub use server::{run, serve, serve_on, Distributor, RunReport};
pub use source::{FieldSource, ImageSequenceSource, StepSource};
