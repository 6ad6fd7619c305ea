//! Scenario simulator: a fixed catalog of traffic scenarios scored with
//! randomized, parameter-adjusted outcomes.

pub mod catalog;
mod simulator;

pub use catalog::{Scenario, find, scenarios};
pub use simulator::{BatchReport, BatchSummary, Effectiveness, ScenarioOutcome, ScenarioSimulator};
