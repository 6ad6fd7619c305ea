pub mod domain;
pub mod error;
pub mod ids;
pub mod random;
pub mod severity;
pub mod time;

pub use domain::{
    Alert, AlertPatch, AlertStatus, ExpectedOutcomes, Metrics, NewAlert, Notification,
    NotificationLevel, Playbook, Protocol, Resource, ResourceKind, ResourcePatch, ResourceStatus,
    ScenarioParameters, SimulationResult,
};
pub use error::{ErrorCode, PoError, PoResult};
pub use ids::{AlertId, NotificationId, ProtocolId, ResourceId};
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use severity::Severity;
pub use time::{EpochMillis, clock_label, date_label, day_of_week, hour_of_day, now_epoch_millis};
