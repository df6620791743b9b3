pub mod prediction;

pub use prediction::{direction_label, Freshness, PredictionService};
