//! Risk prediction: a mock weighted-factor model with an optional remote
//! endpoint and a guarded training routine.

pub mod features;
mod service;

pub use features::{ModelFeatures, RiskFactors, RiskFeatures};
pub use service::{
    ModelInfo, Prediction, PredictionService, PredictionSource, PredictionStatus, TrainingReport,
    TrainingSample,
};
