use async_trait::async_trait;
use po_core::{EpochMillis, PoError, PoResult, now_epoch_millis};
use po_messaging::{DashboardEvent, EventBus};
use po_storage::{KeyValueStore, TAB_STATE_KEY, load_json, persist_best_effort};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

const SOURCE: &str = "tabs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Dashboard,
    Alerts,
    Map,
    Protocols,
    Resources,
    Analytics,
    Playbook,
    Simulation,
    Reports,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 10] = [
        Tab::Dashboard,
        Tab::Alerts,
        Tab::Map,
        Tab::Protocols,
        Tab::Resources,
        Tab::Analytics,
        Tab::Playbook,
        Tab::Simulation,
        Tab::Reports,
        Tab::Settings,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Alerts => "alerts",
            Self::Map => "map",
            Self::Protocols => "protocols",
            Self::Resources => "resources",
            Self::Analytics => "analytics",
            Self::Playbook => "playbook",
            Self::Simulation => "simulation",
            Self::Reports => "reports",
            Self::Settings => "settings",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Alerts => "Active Alerts",
            Self::Map => "Risk Map",
            Self::Protocols => "Protocols",
            Self::Resources => "Resources",
            Self::Analytics => "Analytics",
            Self::Playbook => "AI Playbook",
            Self::Simulation => "Simulation Lab",
            Self::Reports => "Reports",
            Self::Settings => "Settings",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Dashboard => "tachometer-alt",
            Self::Alerts => "bell",
            Self::Map => "map-marked-alt",
            Self::Protocols => "clipboard-list",
            Self::Resources => "users-cog",
            Self::Analytics => "chart-line",
            Self::Playbook => "robot",
            Self::Simulation => "vial",
            Self::Reports => "file-alt",
            Self::Settings => "cog",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tab {
    type Err = PoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.id() == value)
            .ok_or_else(|| PoError::not_found(format!("tab not found: {value}")))
    }
}

/// Produces pane markup on demand.
#[async_trait]
pub trait PaneSource: Send + Sync {
    async fn render_pane(&self, tab: Tab) -> PoResult<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    pub current_tab: Tab,
    pub timestamp_ms: EpochMillis,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabView {
    pub tab: Tab,
    pub name: &'static str,
    pub html: String,
}

struct RouterState {
    current: Tab,
    rendered: HashMap<Tab, String>,
    stale: HashSet<Tab>,
}

pub struct TabRouter {
    state: RwLock<RouterState>,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    panes: Arc<dyn PaneSource>,
}

impl TabRouter {
    pub fn new(storage: Arc<dyn KeyValueStore>, bus: EventBus, panes: Arc<dyn PaneSource>) -> Self {
        Self {
            state: RwLock::new(RouterState {
                current: Tab::Dashboard,
                rendered: HashMap::new(),
                stale: HashSet::new(),
            }),
            storage,
            bus,
            panes,
        }
    }

    /// Restores the persisted pane (dashboard when absent or unreadable) and
    /// activates it.
    pub async fn init(&self) -> PoResult<TabView> {
        let restored = match load_json::<TabRecord>(self.storage.as_ref(), TAB_STATE_KEY).await {
            Ok(Some(record)) => record.current_tab,
            Ok(None) => Tab::Dashboard,
            Err(err) => {
                tracing::warn!(error = %err, "could not load tab state");
                Tab::Dashboard
            }
        };
        self.activate(restored).await
    }

    pub async fn current(&self) -> Tab {
        self.state.read().await.current
    }

    /// Activates `tab_id`. Unknown ids are logged and leave the router untouched.
    pub async fn switch_to(&self, tab_id: &str) -> PoResult<TabView> {
        let tab = match tab_id.parse::<Tab>() {
            Ok(tab) => tab,
            Err(err) => {
                tracing::error!(tab = tab_id, "tab not found");
                return Err(err);
            }
        };
        self.activate(tab).await
    }

    async fn activate(&self, tab: Tab) -> PoResult<TabView> {
        let html = self.content(tab).await?;
        self.state.write().await.current = tab;

        let record = TabRecord {
            current_tab: tab,
            timestamp_ms: now_epoch_millis(),
        };
        persist_best_effort(self.storage.as_ref(), TAB_STATE_KEY, &record).await;

        self.bus.publish(
            SOURCE,
            DashboardEvent::TabChanged {
                tab_id: tab.id().to_string(),
                tab_name: tab.name().to_string(),
            },
        );
        tracing::debug!(tab = tab.id(), "switched tab");
        Ok(TabView {
            tab,
            name: tab.name(),
            html,
        })
    }

    /// Cached markup for `tab`, rendering it the first time or when stale.
    pub async fn content(&self, tab: Tab) -> PoResult<String> {
        {
            let state = self.state.read().await;
            if !state.stale.contains(&tab) {
                if let Some(html) = state.rendered.get(&tab) {
                    return Ok(html.clone());
                }
            }
        }
        let html = self.panes.render_pane(tab).await?;
        let mut state = self.state.write().await;
        state.rendered.insert(tab, html.clone());
        state.stale.remove(&tab);
        Ok(html)
    }

    pub async fn invalidate(&self, tab: Tab) {
        self.state.write().await.stale.insert(tab);
    }

    pub async fn invalidate_all(&self) {
        self.state.write().await.stale.extend(Tab::ALL);
    }

    pub async fn menu(&self) -> Vec<MenuEntry> {
        let current = self.current().await;
        Tab::ALL
            .into_iter()
            .map(|tab| MenuEntry {
                id: tab.id(),
                name: tab.name(),
                icon: tab.icon(),
                active: tab == current,
            })
            .collect()
    }
}
