pub mod actions;
pub mod common;
pub mod export;
pub mod health;
pub mod panes;
pub mod partials;
pub mod ui;
pub mod ui_api;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(ui::index)
        .service(panes::pane)
        .service(partials::partial)
        .service(ui_api::status)
        .service(ui_api::map)
        .service(ui_api::chart)
        .service(ui_api::sse)
        .service(export::export)
        .service(actions::emergency)
        .service(actions::logout)
        .service(actions::refresh)
        .service(actions::simulate_trigger)
        .service(actions::acknowledge_all)
        .service(actions::clear_resolved)
        .service(actions::escalate_alert)
        .service(actions::acknowledge_alert)
        .service(actions::deploy)
        .service(actions::optimize)
        .service(actions::select_resource)
        .service(actions::toggle_traffic)
        .service(actions::toggle_layer)
        .service(actions::zoom)
        .service(actions::train_playbook)
        .service(actions::reset_playbook)
        .service(actions::run_all_scenarios)
        .service(actions::clear_history)
        .service(actions::run_scenario)
        .service(actions::dismiss_notification);
}

#[cfg(test)]
mod tests;
