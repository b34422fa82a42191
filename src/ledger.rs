use anyhow::Result;

use crate::models::TrackedApplication;
use crate::store::KeyValueStore;

const TRUE: &str = "true";
pub const PRIVACY_ACCEPTED_KEY: &str = "privacyPolicyAccepted";
pub const PRIVACY_REJECTED_KEY: &str = "privacyPolicyRejected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Visited,
    ModalShown,
}

impl FlagKind {
    fn prefix(&self) -> &'static str {
        match self {
            FlagKind::Visited => "visited_",
            FlagKind::ModalShown => "modal_shown_",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyDecision {
    Accepted,
    Rejected,
    Pending,
}

pub struct SuppressionLedger<S> {
    store: S,
    scope: Option<String>,
}

impl<S: KeyValueStore> SuppressionLedger<S> {
    /// Flags shared by everyone using this store.
    pub fn new(store: S) -> Self {
        Self { store, scope: None }
    }

    /// Per-opportunity flags prefixed with a user id, so accounts sharing a
    /// store do not suppress each other's popups.
    pub fn scoped(store: S, user_id: &str) -> Self {
        Self {
            store,
            scope: Some(user_id.to_string()),
        }
    }

    fn key(&self, kind: FlagKind, opportunity_id: &str) -> String {
        match &self.scope {
            Some(user) => format!("{}:{}{}", user, kind.prefix(), opportunity_id),
            None => format!("{}{}", kind.prefix(), opportunity_id),
        }
    }

    fn is_set(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key)?.as_deref() == Some(TRUE))
    }

    fn raise(&self, key: &str) -> Result<()> {
        if !self.is_set(key)? {
            tracing::debug!(key, "Setting suppression flag");
            self.store.set(key, TRUE)?;
        }
        Ok(())
    }

    pub fn is_visited(&self, opportunity_id: &str) -> Result<bool> {
        self.is_set(&self.key(FlagKind::Visited, opportunity_id))
    }

    pub fn mark_visited(&self, opportunity_id: &str) -> Result<()> {
        self.raise(&self.key(FlagKind::Visited, opportunity_id))
    }

    pub fn is_modal_shown(&self, opportunity_id: &str) -> Result<bool> {
        self.is_set(&self.key(FlagKind::ModalShown, opportunity_id))
    }

    pub fn mark_modal_shown(&self, opportunity_id: &str) -> Result<()> {
        self.raise(&self.key(FlagKind::ModalShown, opportunity_id))
    }

    /// Reads both flags and applies [`interest_modal_due`]. Callers that act
    /// on `true` must call [`mark_modal_shown`](Self::mark_modal_shown).
    pub fn should_show_interest_modal(
        &self,
        opportunity_id: &str,
        tracked: &[TrackedApplication],
    ) -> Result<bool> {
        let visited = self.is_visited(opportunity_id)?;
        let shown = self.is_modal_shown(opportunity_id)?;
        Ok(interest_modal_due(opportunity_id, visited, shown, tracked))
    }

    pub fn accept_privacy_policy(&self) -> Result<()> {
        self.raise(PRIVACY_ACCEPTED_KEY)
    }

    pub fn reject_privacy_policy(&self) -> Result<()> {
        self.raise(PRIVACY_REJECTED_KEY)
    }

    /// Acceptance wins if both flags were ever set.
    pub fn privacy_decision(&self) -> Result<PrivacyDecision> {
        if self.is_set(PRIVACY_ACCEPTED_KEY)? {
            Ok(PrivacyDecision::Accepted)
        } else if self.is_set(PRIVACY_REJECTED_KEY)? {
            Ok(PrivacyDecision::Rejected)
        } else {
            Ok(PrivacyDecision::Pending)
        }
    }
}

pub fn interest_modal_due(
    opportunity_id: &str,
    visited: bool,
    modal_shown: bool,
    tracked: &[TrackedApplication],
) -> bool {
    visited && !modal_shown && !tracked.iter().any(|t| t.opportunity_id == opportunity_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn tracked(id: &str) -> TrackedApplication {
        TrackedApplication {
            opportunity_id: id.to_string(),
            title: format!("Opportunity {}", id),
            deadline: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            wants_reminder: false,
            status: ApplicationStatus::Applied,
        }
    }

    #[test]
    fn test_modal_hidden_when_not_visited() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);

        assert!(!ledger.should_show_interest_modal("a", &[]).unwrap());
        assert!(!ledger.should_show_interest_modal("a", &[tracked("b")]).unwrap());

        // unrelated flags do not make "a" visited
        ledger.mark_visited("b").unwrap();
        ledger.mark_modal_shown("a").unwrap();
        assert!(!ledger.should_show_interest_modal("a", &[]).unwrap());
    }

    #[test]
    fn test_modal_shown_once_visited_and_untracked() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);

        ledger.mark_visited("a").unwrap();
        assert!(ledger.should_show_interest_modal("a", &[tracked("b")]).unwrap());

        ledger.mark_modal_shown("a").unwrap();
        assert!(!ledger.should_show_interest_modal("a", &[]).unwrap());
        assert!(!ledger.should_show_interest_modal("a", &[tracked("b")]).unwrap());
    }

    #[test]
    fn test_modal_hidden_when_already_tracked() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);
        ledger.mark_visited("a").unwrap();
        assert!(!ledger.should_show_interest_modal("a", &[tracked("a")]).unwrap());
    }

    #[test]
    fn test_decision_has_no_side_effects() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);
        ledger.mark_visited("a").unwrap();

        for _ in 0..3 {
            assert!(ledger.should_show_interest_modal("a", &[]).unwrap());
        }
        assert!(!ledger.is_modal_shown("a").unwrap());
    }

    #[test]
    fn test_flags_are_monotone() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);

        ledger.mark_visited("a").unwrap();
        ledger.mark_modal_shown("a").unwrap();
        ledger.reject_privacy_policy().unwrap();
        // repeat every operation the ledger offers
        ledger.mark_visited("a").unwrap();
        ledger.mark_modal_shown("a").unwrap();
        ledger.accept_privacy_policy().unwrap();
        ledger.reject_privacy_policy().unwrap();
        let _ = ledger.should_show_interest_modal("a", &[]).unwrap();
        let _ = ledger.privacy_decision().unwrap();

        assert!(ledger.is_visited("a").unwrap());
        assert!(ledger.is_modal_shown("a").unwrap());
        assert_eq!(store.get(PRIVACY_REJECTED_KEY).unwrap().as_deref(), Some("true"));
        assert_eq!(store.get(PRIVACY_ACCEPTED_KEY).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_flags_use_browser_keys() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);
        ledger.mark_visited("65f0").unwrap();
        ledger.mark_modal_shown("65f0").unwrap();

        assert_eq!(store.get("visited_65f0").unwrap().as_deref(), Some("true"));
        assert_eq!(store.get("modal_shown_65f0").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_scoped_ledgers_do_not_share_flags() {
        let store = MemoryStore::new();
        let alice = SuppressionLedger::scoped(&store, "alice");
        let bob = SuppressionLedger::scoped(&store, "bob");

        alice.mark_visited("a").unwrap();
        assert!(alice.is_visited("a").unwrap());
        assert!(!bob.is_visited("a").unwrap());
        assert_eq!(store.get("alice:visited_a").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_privacy_decision() {
        let store = MemoryStore::new();
        let ledger = SuppressionLedger::new(&store);
        assert_eq!(ledger.privacy_decision().unwrap(), PrivacyDecision::Pending);

        ledger.reject_privacy_policy().unwrap();
        assert_eq!(ledger.privacy_decision().unwrap(), PrivacyDecision::Rejected);

        ledger.accept_privacy_policy().unwrap();
        assert_eq!(ledger.privacy_decision().unwrap(), PrivacyDecision::Accepted);
    }

    #[test]
    fn test_interest_modal_due_is_pure() {
        assert!(interest_modal_due("a", true, false, &[]));
        assert!(!interest_modal_due("a", false, false, &[]));
        assert!(!interest_modal_due("a", true, true, &[]));
        assert!(!interest_modal_due("a", true, false, &[tracked("a")]));
    }
}
