use actix_web::rt::time::interval;
use actix_web::web::Bytes;
use actix_web::{HttpResponse, get, web};
use futures_util::stream::unfold;
use po_messaging::EventSubscriber;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::AppState;

const HEARTBEAT: Duration = Duration::from_secs(15);

#[get("/ui/status")]
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.status().await)
}

#[get("/ui/map")]
pub async fn map(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.map().snapshot().await)
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub period: Option<String>,
}

#[get("/ui/chart")]
pub async fn chart(state: web::Data<AppState>, query: web::Query<ChartQuery>) -> HttpResponse {
    let chart = match query.period.as_deref() {
        Some(period) => state.orchestrator.update_chart(period).await,
        None => state.orchestrator.ui().chart().await,
    };
    HttpResponse::Ok().json(chart)
}

/// Forwards every bus event to the browser, named after the event kind.
#[get("/ui/stream/sse")]
pub async fn sse(state: web::Data<AppState>) -> HttpResponse {
    let subscriber = state.orchestrator.bus().subscribe();
    let ticker = interval(HEARTBEAT);
    let stream = unfold(
        (subscriber, ticker, 0u64),
        |(mut subscriber, mut ticker, beats)| async move {
            let (payload, beats) = next_frame(&mut subscriber, &mut ticker, beats).await?;
            Some((
                Ok::<Bytes, actix_web::Error>(Bytes::from(payload)),
                (subscriber, ticker, beats),
            ))
        },
    );

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

async fn next_frame(
    subscriber: &mut EventSubscriber,
    ticker: &mut tokio::time::Interval,
    beats: u64,
) -> Option<(String, u64)> {
    tokio::select! {
        envelope = subscriber.recv() => {
            let envelope = envelope?;
            Some((build_sse_event(envelope.event.name(), &envelope), beats))
        }
        _ = ticker.tick() => Some((build_sse_event("heartbeat", &beats), beats + 1)),
    }
}

pub(crate) fn build_sse_event<T: Serialize>(event: &str, payload: &T) -> String {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("event: {event}\ndata: {data}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frames_carry_event_name_and_json() {
        let frame = build_sse_event("emergency-mode", &serde_json::json!({ "enabled": true }));
        assert_eq!(frame, "event: emergency-mode\ndata: {\"enabled\":true}\n\n");
    }
}
