//! Dashboard composition: the orchestrator, pane routing, map layers and the
//! rendered views served by the web service.

pub mod map;
mod orchestrator;
mod render;
pub mod tabs;
pub mod views;

pub use map::{LayerKind, MapPresentation, MapSnapshot, MapStats, MapView};
pub use orchestrator::{
    AppStateRecord, ExportFile, Module, Orchestrator, OrchestratorState, OrchestratorStatus,
};
pub use render::PaneRenderer;
pub use tabs::{MenuEntry, PaneSource, Tab, TabRecord, TabRouter, TabView};
pub use views::{DashboardView, ImpactChart, Partial, UiRefresher, UiStatus};
