//! Step-ordered ingestion of a Sentry organization into a typed entity graph.
//!
//! Pipeline: validate configuration and the step graph -> authenticate ->
//! run steps in topological order against one job state -> report.

pub mod config;
pub mod constants;
pub mod converters;
pub mod diagnostics;
pub mod driver;
pub mod errors;
pub mod events;
pub mod lint;
pub mod runner;
pub mod step;
pub mod steps;

pub use config::*;
pub use diagnostics::*;
pub use driver::*;
pub use errors::*;
pub use events::*;
pub use lint::*;
pub use runner::*;
pub use step::*;
