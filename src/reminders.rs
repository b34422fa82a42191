use std::collections::HashSet;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::api::ApiClient;
use crate::dismiss::{AutoDismiss, EMPTY_POPUP_CLOSE_DELAY};
use crate::error::{ApiError, WriteOutcome};
use crate::models::{Notification, Opportunity};
use crate::urgency::{days_remaining, deadline_label, is_urgent};

#[allow(async_fn_in_trait)]
pub trait ReminderBackend {
    async fn incomplete_applications(&self) -> Result<Vec<Opportunity>, ApiError>;
    async fn mark_completed(&self, opportunity_id: &str) -> Result<(), ApiError>;
    async fn notifications(&self) -> Result<Vec<Notification>, ApiError>;
    async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<(), ApiError>;
}

impl ReminderBackend for ApiClient {
    async fn incomplete_applications(&self) -> Result<Vec<Opportunity>, ApiError> {
        ApiClient::incomplete_applications(self).await
    }

    async fn mark_completed(&self, opportunity_id: &str) -> Result<(), ApiError> {
        ApiClient::mark_completed(self, opportunity_id).await
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        ApiClient::notifications(self).await
    }

    async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<(), ApiError> {
        ApiClient::mark_reminder_sent(self, reminder_id).await
    }
}

/// An opportunity with its deadline distance frozen at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub opportunity: Opportunity,
    pub days_remaining: i64,
    pub is_urgent: bool,
}

impl Reminder {
    pub fn snapshot(opportunity: Opportunity, today: NaiveDate) -> Self {
        let days = days_remaining(opportunity.deadline, today);
        Self {
            opportunity,
            days_remaining: days,
            is_urgent: is_urgent(days),
        }
    }

    pub fn id(&self) -> &str {
        &self.opportunity.id
    }

    pub fn label(&self) -> String {
        deadline_label(self.days_remaining)
    }

    pub fn is_expired(&self) -> bool {
        self.days_remaining < 0
    }
}

pub struct ReminderAggregator<B> {
    backend: B,
    last: Vec<Reminder>,
}

impl<B: ReminderBackend> ReminderAggregator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            last: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn fetch_reminders(&mut self) -> Vec<Reminder> {
        self.fetch_reminders_on(Local::now().date_naive()).await
    }

    /// Backend order is kept as-is.
    pub async fn fetch_reminders_on(&mut self, today: NaiveDate) -> Vec<Reminder> {
        match self.backend.incomplete_applications().await {
            Ok(opportunities) => {
                self.last = opportunities
                    .into_iter()
                    .map(|o| Reminder::snapshot(o, today))
                    .collect();
                tracing::debug!(count = self.last.len(), "Fetched reminders");
            }
            Err(e) => {
                tracing::warn!(error = %e, kept = self.last.len(), "Reminder fetch failed, keeping previous list");
            }
        }
        self.last.clone()
    }

    /// Application-update notifications, first occurrence of each id only.
    pub async fn application_updates(&self) -> Vec<Notification> {
        match self.backend.notifications().await {
            Ok(notifications) => dedup_application_updates(notifications),
            Err(e) => {
                tracing::warn!(error = %e, "Notification fetch failed");
                Vec::new()
            }
        }
    }

    /// Removes the reminder from the popup right away, then tells the backend.
    pub async fn complete(&self, popup: &mut ReminderPopup, opportunity_id: &str) -> WriteOutcome {
        popup.mark_complete(opportunity_id);
        WriteOutcome::from_result("mark_completed", self.backend.mark_completed(opportunity_id).await)
    }

    pub async fn mark_sent(&self, notification: &Notification) -> WriteOutcome {
        let reminder_id = notification.reminder_id.as_deref().unwrap_or(&notification.id);
        WriteOutcome::from_result("mark_reminder_sent", self.backend.mark_reminder_sent(reminder_id).await)
    }
}

pub fn dedup_application_updates(notifications: Vec<Notification>) -> Vec<Notification> {
    let mut seen = HashSet::new();
    notifications
        .into_iter()
        .filter(|n| n.is_application_update())
        .filter(|n| seen.insert(n.id.clone()))
        .collect()
}

/// Reminder list shown to the user for one popup lifetime.
///
/// Completed ids live only as long as the popup does. Once the last item is
/// completed the popup stays open for [`EMPTY_POPUP_CLOSE_DELAY`] and then
/// closes.
#[derive(Debug)]
pub struct ReminderPopup {
    reminders: Vec<Reminder>,
    completed: HashSet<String>,
    closing: Option<AutoDismiss>,
    dismissed: bool,
}

impl ReminderPopup {
    /// Passed deadlines are left out. Returns `None` when nothing is left
    /// to show.
    pub fn open(reminders: Vec<Reminder>) -> Option<Self> {
        let reminders: Vec<Reminder> = reminders.into_iter().filter(|r| !r.is_expired()).collect();
        if reminders.is_empty() {
            return None;
        }
        Some(Self {
            reminders,
            completed: HashSet::new(),
            closing: None,
            dismissed: false,
        })
    }

    pub fn visible(&self) -> Vec<&Reminder> {
        self.reminders
            .iter()
            .filter(|r| !self.completed.contains(r.id()))
            .collect()
    }

    pub fn urgent(&self) -> Vec<&Reminder> {
        self.visible().into_iter().filter(|r| r.is_urgent).collect()
    }

    /// Returns false if the id is not on display.
    pub fn mark_complete(&mut self, opportunity_id: &str) -> bool {
        if !self.reminders.iter().any(|r| r.id() == opportunity_id) || !self.completed.insert(opportunity_id.to_string()) {
            return false;
        }
        if self.visible().is_empty() && self.closing.is_none() {
            tracing::debug!("Last reminder completed, closing popup");
            self.closing = Some(AutoDismiss::start(EMPTY_POPUP_CLOSE_DELAY));
        }
        true
    }

    pub fn dismiss(&mut self) {
        self.dismissed = true;
        if let Some(timer) = self.closing.as_mut() {
            timer.dismiss();
        }
    }

    pub fn is_open(&self) -> bool {
        !self.dismissed && self.closing.as_ref().is_none_or(|t| t.is_visible())
    }

    /// Time left before an emptied popup closes, if it is closing.
    pub fn closes_in(&self) -> Option<Duration> {
        self.closing.as_ref().map(|t| t.remaining())
    }

    pub async fn closed(&self) {
        match &self.closing {
            Some(timer) => timer.dismissed().await,
            None if self.dismissed => {}
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpportunityType;
    use std::cell::{Cell, RefCell};

    fn opp(id: &str, deadline: NaiveDate) -> Opportunity {
        Opportunity {
            id: id.to_string(),
            title: format!("Opportunity {}", id),
            organization: Some("Org".to_string()),
            kind: OpportunityType::Scholarship,
            deadline,
            application_link: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn notification(id: &str, kind: &str) -> Notification {
        Notification {
            id: id.to_string(),
            kind: kind.to_string(),
            message: format!("update {}", id),
            opportunity_id: None,
            reminder_id: None,
            read: false,
            created_at: None,
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        reminders: RefCell<Option<Vec<Opportunity>>>,
        notifications: Vec<Notification>,
        fetches: Cell<usize>,
        completed: RefCell<Vec<String>>,
        sent: RefCell<Vec<String>>,
        fail_writes: bool,
    }

    fn backend_error() -> ApiError {
        ApiError::Status {
            path: "/test".to_string(),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }

    impl ReminderBackend for FakeBackend {
        async fn incomplete_applications(&self) -> Result<Vec<Opportunity>, ApiError> {
            self.fetches.set(self.fetches.get() + 1);
            self.reminders.borrow().clone().ok_or_else(backend_error)
        }

        async fn mark_completed(&self, opportunity_id: &str) -> Result<(), ApiError> {
            self.completed.borrow_mut().push(opportunity_id.to_string());
            if self.fail_writes { Err(backend_error()) } else { Ok(()) }
        }

        async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
            Ok(self.notifications.clone())
        }

        async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<(), ApiError> {
            self.sent.borrow_mut().push(reminder_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshots_days_and_keeps_backend_order() {
        let backend = FakeBackend::default();
        *backend.reminders.borrow_mut() = Some(vec![opp("late", day(20)), opp("soon", day(2)), opp("mid", day(4))]);
        let mut aggregator = ReminderAggregator::new(backend);

        let reminders = aggregator.fetch_reminders_on(day(1)).await;
        let ids: Vec<&str> = reminders.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["late", "soon", "mid"]);
        assert_eq!(reminders[1].days_remaining, 1);
        assert_eq!(reminders[1].label(), "Tomorrow!");
        assert!(reminders[1].is_urgent);
        assert_eq!(reminders[2].days_remaining, 3);
        assert!(reminders[2].is_urgent);
        assert!(!reminders[0].is_urgent);
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_previous_list() {
        let backend = FakeBackend::default();
        let mut aggregator = ReminderAggregator::new(backend);
        assert!(aggregator.fetch_reminders_on(day(1)).await.is_empty());

        *aggregator.backend().reminders.borrow_mut() = Some(vec![opp("a", day(5))]);
        assert_eq!(aggregator.fetch_reminders_on(day(1)).await.len(), 1);

        *aggregator.backend().reminders.borrow_mut() = None;
        let kept = aggregator.fetch_reminders_on(day(2)).await;
        assert_eq!(kept.len(), 1);
        // snapshot from the successful fetch, not recomputed
        assert_eq!(kept[0].days_remaining, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completing_removes_without_refetch_and_closes_after_delay() {
        let backend = FakeBackend::default();
        *backend.reminders.borrow_mut() = Some(vec![opp("a", day(3)), opp("b", day(9))]);
        let mut aggregator = ReminderAggregator::new(backend);
        let mut popup = ReminderPopup::open(aggregator.fetch_reminders_on(day(1)).await).unwrap();
        assert_eq!(aggregator.backend().fetches.get(), 1);

        let outcome = aggregator.complete(&mut popup, "a").await;
        assert!(outcome.is_applied());
        assert_eq!(popup.visible().iter().map(|r| r.id()).collect::<Vec<_>>(), vec!["b"]);
        assert!(popup.is_open());

        aggregator.complete(&mut popup, "b").await;
        assert!(popup.visible().is_empty());
        assert!(popup.is_open(), "popup must not close immediately");
        assert_eq!(popup.closes_in(), Some(EMPTY_POPUP_CLOSE_DELAY));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(popup.is_open());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!popup.is_open());

        assert_eq!(aggregator.backend().fetches.get(), 1);
        assert_eq!(*aggregator.backend().completed.borrow(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_completion_is_not_rolled_back() {
        let backend = FakeBackend {
            fail_writes: true,
            ..FakeBackend::default()
        };
        let aggregator = ReminderAggregator::new(backend);
        let mut popup = ReminderPopup::open(vec![
            Reminder::snapshot(opp("a", day(3)), day(1)),
            Reminder::snapshot(opp("b", day(3)), day(1)),
        ])
        .unwrap();

        let outcome = aggregator.complete(&mut popup, "a").await;
        assert!(matches!(outcome, WriteOutcome::Failed(msg) if msg.contains("boom")));
        assert_eq!(popup.visible().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_ignores_unknown_and_repeated_ids() {
        let mut popup = ReminderPopup::open(vec![Reminder::snapshot(opp("a", day(3)), day(1))]).unwrap();
        assert!(!popup.mark_complete("zzz"));
        assert!(popup.mark_complete("a"));
        assert!(!popup.mark_complete("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_drops_passed_deadlines() {
        let reminders = vec![
            Reminder::snapshot(opp("gone", day(1)), day(5)),
            Reminder::snapshot(opp("today", day(5)), day(5)),
        ];
        let popup = ReminderPopup::open(reminders).unwrap();
        let visible = popup.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].label(), "Today!");

        assert!(ReminderPopup::open(vec![Reminder::snapshot(opp("gone", day(1)), day(5))]).is_none());
        assert!(ReminderPopup::open(Vec::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_closes_now() {
        let mut popup = ReminderPopup::open(vec![Reminder::snapshot(opp("a", day(3)), day(1))]).unwrap();
        popup.dismiss();
        assert!(!popup.is_open());
        popup.closed().await;
    }

    #[tokio::test]
    async fn test_application_updates_filtered_and_deduplicated() {
        let backend = FakeBackend {
            notifications: vec![
                notification("n1", "application_update"),
                notification("n2", "forum_reply"),
                notification("n3", "application_update"),
                notification("n1", "application_update"),
            ],
            ..FakeBackend::default()
        };
        let aggregator = ReminderAggregator::new(backend);

        let updates = aggregator.application_updates().await;
        assert_eq!(updates.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["n1", "n3"]);
    }

    #[tokio::test]
    async fn test_mark_sent_prefers_reminder_id() {
        let aggregator = ReminderAggregator::new(FakeBackend::default());
        let mut with_reminder = notification("n1", "application_update");
        with_reminder.reminder_id = Some("r1".to_string());

        assert!(aggregator.mark_sent(&with_reminder).await.is_applied());
        aggregator.mark_sent(&notification("n2", "application_update")).await;
        assert_eq!(*aggregator.backend().sent.borrow(), vec!["r1", "n2"]);
    }

    #[tokio::test]
    async fn test_completion_against_backend_uses_opportunity_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/reminders/incomplete-applications")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"reminders": [
                    {"_id": "r1", "opportunityId": "o1", "title": "Grant", "type": "scholarship", "deadline": "2025-03-03"},
                    {"_id": "r2", "opportunityId": "o2", "title": "Fellowship", "type": "fellowship", "deadline": "2025-03-09"}
                ]}"#,
            )
            .create_async()
            .await;
        let applied = server
            .mock("PUT", "/api/reminders/mark-completed/o1")
            .with_status(200)
            .create_async()
            .await;
        let failed = server
            .mock("PUT", "/api/reminders/mark-completed/o2")
            .with_status(500)
            .with_body("database unavailable")
            .create_async()
            .await;

        let mut aggregator = ReminderAggregator::new(ApiClient::new(&server.url()));
        let reminders = aggregator.fetch_reminders_on(day(1)).await;
        assert_eq!(reminders.iter().map(Reminder::id).collect::<Vec<_>>(), vec!["o1", "o2"]);
        assert!(reminders[0].is_urgent);

        let mut popup = ReminderPopup::open(reminders).unwrap();
        assert_eq!(aggregator.complete(&mut popup, "o1").await, WriteOutcome::Applied);

        let outcome = aggregator.complete(&mut popup, "o2").await;
        assert!(matches!(&outcome, WriteOutcome::Failed(msg) if msg.contains("database unavailable")));
        // no rollback on failure
        assert!(popup.visible().is_empty());

        applied.assert_async().await;
        failed.assert_async().await;
    }
}
