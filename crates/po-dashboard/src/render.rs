use po_core::{ErrorCode, PoError, PoResult};
use serde::Serialize;
use tera::{Context, Tera};

use crate::tabs::Tab;

const TEMPLATES: [(&str, &str); 16] = [
    ("index.html", include_str!("../templates/index.html")),
    ("panes/dashboard.html", include_str!("../templates/panes/dashboard.html")),
    ("panes/alerts.html", include_str!("../templates/panes/alerts.html")),
    ("panes/map.html", include_str!("../templates/panes/map.html")),
    ("panes/protocols.html", include_str!("../templates/panes/protocols.html")),
    ("panes/resources.html", include_str!("../templates/panes/resources.html")),
    ("panes/analytics.html", include_str!("../templates/panes/analytics.html")),
    ("panes/playbook.html", include_str!("../templates/panes/playbook.html")),
    ("panes/simulation.html", include_str!("../templates/panes/simulation.html")),
    ("panes/reports.html", include_str!("../templates/panes/reports.html")),
    ("panes/settings.html", include_str!("../templates/panes/settings.html")),
    ("partials/stats.html", include_str!("../templates/partials/stats.html")),
    ("partials/alerts.html", include_str!("../templates/partials/alerts.html")),
    ("partials/resources.html", include_str!("../templates/partials/resources.html")),
    ("partials/protocols.html", include_str!("../templates/partials/protocols.html")),
    ("partials/notifications.html", include_str!("../templates/partials/notifications.html")),
];

/// Compiled dashboard templates.
pub struct PaneRenderer {
    tera: Tera,
}

impl PaneRenderer {
    pub fn new() -> PoResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES).map_err(template_error)?;
        Ok(Self { tera })
    }

    pub fn render_pane<T: Serialize>(&self, tab: Tab, view: &T) -> PoResult<String> {
        self.render(&format!("panes/{}.html", tab.id()), view)
    }

    pub fn render<T: Serialize>(&self, template: &str, view: &T) -> PoResult<String> {
        let context = Context::from_serialize(view).map_err(template_error)?;
        self.tera.render(template, &context).map_err(template_error)
    }
}

fn template_error(err: tera::Error) -> PoError {
    PoError::new(ErrorCode::Internal, format!("template error: {err:?}"))
}
