//! Toast notifications with a rolling persisted history.

use po_core::{Alert, Notification, NotificationId, NotificationLevel, now_epoch_millis};
use po_messaging::{DashboardEvent, EventBus};
use po_observability::{NOTIFICATIONS_TOTAL, PERSIST_FAILURES_TOTAL};
use po_storage::{KeyValueStore, NOTIFICATIONS_KEY, load_json, persist_best_effort};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const HISTORY_LIMIT: usize = 100;
const ALERT_TOAST_MS: u64 = 7000;
const SOURCE: &str = "notifications";

/// Options for [`NotificationCenter::show`]. A zero duration keeps the toast
/// on screen until dismissed.
#[derive(Debug, Clone)]
pub struct ToastRequest {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub duration_ms: Option<u64>,
}

impl ToastRequest {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            duration_ms: None,
        }
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    history: RwLock<Vec<Notification>>,
    visible: RwLock<Vec<NotificationId>>,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
}

impl NotificationCenter {
    pub fn new(storage: Arc<dyn KeyValueStore>, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                history: RwLock::new(Vec::new()),
                visible: RwLock::new(Vec::new()),
                storage,
                bus,
            }),
        }
    }

    /// Restores persisted history. A corrupt blob is logged and ignored.
    pub async fn init(&self) {
        match load_json::<Vec<Notification>>(self.inner.storage.as_ref(), NOTIFICATIONS_KEY).await {
            Ok(Some(mut saved)) => {
                saved.truncate(HISTORY_LIMIT);
                tracing::debug!(count = saved.len(), "notification history restored");
                *self.inner.history.write().await = saved;
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "could not load notifications"),
        }
    }

    pub async fn show(&self, request: ToastRequest) -> NotificationId {
        let notification = Notification {
            id: NotificationId::generate(),
            level: request.level,
            title: request.title,
            message: request.message,
            duration_ms: request
                .duration_ms
                .unwrap_or_else(|| request.level.default_duration_ms()),
            timestamp_ms: now_epoch_millis(),
            read: false,
        };
        let id = notification.id.clone();

        {
            let mut history = self.inner.history.write().await;
            history.insert(0, notification.clone());
            history.truncate(HISTORY_LIMIT);
        }
        self.inner.visible.write().await.push(id.clone());
        self.persist().await;

        metrics::counter!(NOTIFICATIONS_TOTAL, "level" => notification.level.as_str()).increment(1);
        tracing::debug!(level = notification.level.as_str(), title = %notification.title, "notification shown");

        if notification.duration_ms > 0 {
            let center = self.clone();
            let dismiss_id = id.clone();
            let delay = Duration::from_millis(notification.duration_ms);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                center.dismiss(&dismiss_id).await;
            });
        }

        self.inner
            .bus
            .publish(SOURCE, DashboardEvent::NotificationShown(notification));
        id
    }

    pub async fn success(&self, message: impl Into<String>) -> NotificationId {
        self.show(ToastRequest::new(NotificationLevel::Success, "Success", message))
            .await
    }

    pub async fn error(&self, message: impl Into<String>) -> NotificationId {
        self.show(ToastRequest::new(NotificationLevel::Error, "Error", message))
            .await
    }

    pub async fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.show(ToastRequest::new(NotificationLevel::Warning, "Warning", message))
            .await
    }

    pub async fn info(&self, message: impl Into<String>) -> NotificationId {
        self.show(ToastRequest::new(NotificationLevel::Info, "Information", message))
            .await
    }

    pub async fn show_alert(&self, alert: &Alert) -> NotificationId {
        self.show(
            ToastRequest::new(
                NotificationLevel::Warning,
                "New Alert Detected",
                format!("{} at {}", alert.alert_type, alert.location),
            )
            .duration_ms(ALERT_TOAST_MS),
        )
        .await
    }

    /// Hides the toast and marks its history entry read. Unknown ids are a no-op.
    pub async fn dismiss(&self, id: &NotificationId) {
        self.inner.visible.write().await.retain(|visible| visible != id);
        let changed = {
            let mut history = self.inner.history.write().await;
            match history.iter_mut().find(|notification| &notification.id == id) {
                Some(notification) if !notification.read => {
                    notification.read = true;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.persist().await;
        }
    }

    pub async fn dismiss_all(&self) {
        let visible: Vec<NotificationId> = self.inner.visible.read().await.clone();
        for id in &visible {
            self.dismiss(id).await;
        }
    }

    /// Notifications currently on screen, newest first.
    pub async fn visible(&self) -> Vec<Notification> {
        let visible = self.inner.visible.read().await;
        self.inner
            .history
            .read()
            .await
            .iter()
            .filter(|notification| visible.contains(&notification.id))
            .cloned()
            .collect()
    }

    pub async fn history(&self) -> Vec<Notification> {
        self.inner.history.read().await.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.inner
            .history
            .read()
            .await
            .iter()
            .filter(|notification| !notification.read)
            .count()
    }

    pub async fn mark_all_read(&self) {
        for notification in self.inner.history.write().await.iter_mut() {
            notification.read = true;
        }
        self.persist().await;
    }

    pub async fn clear_all(&self) {
        self.inner.history.write().await.clear();
        self.inner.visible.write().await.clear();
        self.persist().await;
    }

    async fn persist(&self) {
        let history = self.inner.history.read().await.clone();
        if !persist_best_effort(self.inner.storage.as_ref(), NOTIFICATIONS_KEY, &history).await {
            metrics::counter!(PERSIST_FAILURES_TOTAL, "key" => NOTIFICATIONS_KEY).increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_storage::MemoryStore;

    fn center() -> (Arc<MemoryStore>, EventBus, NotificationCenter) {
        let storage = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let center = NotificationCenter::new(storage.clone(), bus.clone());
        (storage, bus, center)
    }

    #[tokio::test(start_paused = true)]
    async fn toasts_use_level_durations_and_auto_dismiss() {
        let (_storage, _bus, center) = center();
        center.error("disk full").await;
        center.success("saved").await;

        let history = center.history().await;
        assert_eq!(history[0].duration_ms, 4000);
        assert_eq!(history[1].duration_ms, 6000);
        assert_eq!(center.visible().await.len(), 2);

        tokio::time::sleep(Duration::from_millis(4500)).await;
        let visible = center.visible().await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].level, NotificationLevel::Error);
        assert_eq!(center.unread_count().await, 1);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(center.visible().await.is_empty());
        assert_eq!(center.unread_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_stays_until_dismissed() {
        let (_storage, _bus, center) = center();
        let id = center
            .show(ToastRequest::new(NotificationLevel::Info, "Pinned", "stays").duration_ms(0))
            .await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(center.visible().await.len(), 1);
        center.dismiss(&id).await;
        assert!(center.visible().await.is_empty());
    }

    #[tokio::test]
    async fn history_keeps_the_newest_hundred() {
        let (storage, _bus, center) = center();
        for index in 0..105 {
            center
                .show(ToastRequest::new(NotificationLevel::Info, "n", index.to_string()).duration_ms(0))
                .await;
        }
        let history = center.history().await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].message, "104");

        let persisted: Vec<Notification> = load_json(storage.as_ref(), NOTIFICATIONS_KEY)
            .await
            .expect("load")
            .expect("present");
        assert_eq!(persisted.len(), HISTORY_LIMIT);

        let restored = NotificationCenter::new(storage.clone(), EventBus::new());
        restored.init().await;
        assert_eq!(restored.unread_count().await, HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn alert_toast_is_published_on_the_bus() {
        let (_storage, bus, center) = center();
        let mut subscriber = bus.subscribe();
        let alert = Alert {
            id: "alert-1".into(),
            created_at_ms: 0,
            time: "10:00:00".into(),
            alert_type: "Speed Violation".into(),
            protocol: "SP-001".into(),
            location: "M1 Highway, KM 3.0".into(),
            severity: po_core::Severity::High,
            confidence: 0.9,
            status: po_core::AlertStatus::Active,
            description: String::new(),
        };
        center.show_alert(&alert).await;

        let envelope = subscriber.recv().await.expect("event");
        match envelope.event {
            DashboardEvent::NotificationShown(notification) => {
                assert_eq!(notification.duration_ms, 7000);
                assert_eq!(notification.message, "Speed Violation at M1 Highway, KM 3.0");
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn mark_all_read_and_clear() {
        let (_storage, _bus, center) = center();
        center.warning("a").await;
        center.info("b").await;
        center.mark_all_read().await;
        assert_eq!(center.unread_count().await, 0);
        center.dismiss_all().await;
        assert!(center.visible().await.is_empty());
        center.clear_all().await;
        assert!(center.history().await.is_empty());
    }
}
