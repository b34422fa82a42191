use anyhow::Result;

use crate::api::{ApiClient, DeadlineReminderRequest};
use crate::error::{ApiError, WriteOutcome};
use crate::events::{EventBus, HubEvent, NotificationId};
use crate::ledger::SuppressionLedger;
use crate::models::{ApplicationStatus, Opportunity, TrackedApplication};
use crate::store::KeyValueStore;
use crate::urgency::URGENT_THRESHOLD_DAYS;

pub const DEADLINE_REMINDER_TYPE: &str = "deadline";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestResult {
    pub tracked: WriteOutcome,
    pub reminder: Option<WriteOutcome>,
}

pub struct Tracker<'a, S> {
    client: &'a ApiClient,
    ledger: &'a SuppressionLedger<S>,
}

impl<'a, S: KeyValueStore> Tracker<'a, S> {
    pub fn new(client: &'a ApiClient, ledger: &'a SuppressionLedger<S>) -> Self {
        Self { client, ledger }
    }

    pub fn visit(&self, opportunity_id: &str) -> Result<()> {
        self.ledger.mark_visited(opportunity_id)
    }

    /// Tracked applications, or an empty list if the backend is unreachable.
    pub async fn tracked_applications(&self) -> Vec<TrackedApplication> {
        match self.client.tracked_applications().await {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch tracked applications");
                Vec::new()
            }
        }
    }

    /// Opportunities whose interest modal is due, in the given order.
    pub fn due_interest_prompts<'o>(
        &self,
        opportunities: &'o [Opportunity],
        tracked: &[TrackedApplication],
    ) -> Result<Vec<&'o Opportunity>> {
        let mut due = Vec::new();
        for opportunity in opportunities {
            if self.ledger.should_show_interest_modal(&opportunity.id, tracked)? {
                due.push(opportunity);
            }
        }
        Ok(due)
    }

    /// The user says they applied. The modal is suppressed before any
    /// request goes out, so a failed write never brings it back.
    pub async fn confirm_interest(&self, opportunity: &Opportunity, wants_reminder: bool) -> Result<InterestResult> {
        self.ledger.mark_modal_shown(&opportunity.id)?;

        let application = TrackedApplication::for_opportunity(opportunity, wants_reminder);
        let tracked = WriteOutcome::from_result("track_application", self.client.track_application(&application).await);

        let reminder = if wants_reminder {
            let request = DeadlineReminderRequest {
                opportunity_id: &opportunity.id,
                deadline: opportunity.deadline.format("%Y-%m-%d").to_string(),
                reminder_type: DEADLINE_REMINDER_TYPE,
                reminder_days: URGENT_THRESHOLD_DAYS as u32,
            };
            Some(WriteOutcome::from_result(
                "set_deadline_reminder",
                self.client.set_deadline_reminder(&request).await,
            ))
        } else {
            None
        };

        tracing::info!(opportunity_id = %opportunity.id, wants_reminder, "Tracked application");
        Ok(InterestResult { tracked, reminder })
    }

    pub fn decline_interest(&self, opportunity_id: &str) -> Result<()> {
        self.ledger.mark_modal_shown(opportunity_id)
    }

    pub async fn update_status(&self, opportunity_id: &str, status: ApplicationStatus) -> Result<(), ApiError> {
        self.client.update_application_status(opportunity_id, status).await
    }
}

/// Answers the "did you finish your pending applications" banner and tells
/// the notification bar to drop it, whatever the backend says.
pub async fn complete_pending(client: &ApiClient, bus: &EventBus, completed: bool) -> WriteOutcome {
    let outcome = WriteOutcome::from_result("complete_pending", client.complete_pending(completed).await);
    bus.publish(HubEvent::RemoveNotification(NotificationId::PendingOpportunities));
    outcome
}
