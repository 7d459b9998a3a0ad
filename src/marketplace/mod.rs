//! Experiment marketplace subsystem (catalog + display shaping).

pub mod store;
pub mod types;

pub use store::ExperimentStore;
pub use types::{ChainTotals, Experiment, ExperimentView, NewExperiment, PositionView};
