use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityType {
    Scholarship,
    Internship,
    Job,
    Fellowship,
    Mentorship,
    #[serde(other)]
    Other,
}

impl OpportunityType {
    pub fn label(&self) -> &'static str {
        match self {
            OpportunityType::Scholarship => "scholarship",
            OpportunityType::Internship => "internship",
            OpportunityType::Job => "job",
            OpportunityType::Fellowship => "fellowship",
            OpportunityType::Mentorship => "mentorship",
            OpportunityType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scholarship" | "scholarships" => Some(OpportunityType::Scholarship),
            "internship" | "internships" => Some(OpportunityType::Internship),
            "job" | "jobs" => Some(OpportunityType::Job),
            "fellowship" | "fellowships" => Some(OpportunityType::Fellowship),
            "mentorship" => Some(OpportunityType::Mentorship),
            "other" => Some(OpportunityType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "OpportunityWire")]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub organization: Option<String>,
    pub kind: OpportunityType,
    pub deadline: NaiveDate,
    pub application_link: Option<String>,
}

// Reminder rows carry their own `_id` next to `opportunityId`; the
// opportunity id wins so completions hit the right record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpportunityWire {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    opportunity_id: Option<String>,
    title: String,
    #[serde(default)]
    organization: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    kind: OpportunityType,
    #[serde(deserialize_with = "deserialize_deadline")]
    deadline: NaiveDate,
    #[serde(default)]
    application_link: Option<String>,
}

impl TryFrom<OpportunityWire> for Opportunity {
    type Error = String;

    fn try_from(wire: OpportunityWire) -> Result<Self, Self::Error> {
        let id = wire
            .opportunity_id
            .or(wire.object_id)
            .or(wire.id)
            .ok_or_else(|| format!("opportunity \"{}\" has no id", wire.title))?;
        Ok(Self {
            id,
            title: wire.title,
            organization: wire.organization,
            kind: wire.kind,
            deadline: wire.deadline,
            application_link: wire.application_link,
        })
    }
}

fn default_type() -> OpportunityType {
    OpportunityType::Other
}

/// Keep only opportunities of the given type; `None` keeps everything.
pub fn filter_by_type(opportunities: &[Opportunity], kind: Option<OpportunityType>) -> Vec<Opportunity> {
    opportunities
        .iter()
        .filter(|o| kind.is_none_or(|k| o.kind == k))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    UnderReview,
    Interview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(ApplicationStatus::Applied),
            "under_review" | "under-review" | "review" => Some(ApplicationStatus::UnderReview),
            "interview" => Some(ApplicationStatus::Interview),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedApplication {
    pub opportunity_id: String,
    pub title: String,
    #[serde(deserialize_with = "deserialize_deadline")]
    pub deadline: NaiveDate,
    #[serde(default)]
    pub wants_reminder: bool,
    pub status: ApplicationStatus,
}

impl TrackedApplication {
    pub fn for_opportunity(opportunity: &Opportunity, wants_reminder: bool) -> Self {
        Self {
            opportunity_id: opportunity.id.clone(),
            title: opportunity.title.clone(),
            deadline: opportunity.deadline,
            wants_reminder,
            status: ApplicationStatus::Applied,
        }
    }

    // Status labels carry no ordering: any status may follow any other.
    pub fn set_status(&mut self, status: ApplicationStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub opportunity_id: Option<String>,
    #[serde(default)]
    pub reminder_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub const APPLICATION_UPDATE: &str = "application_update";

impl Notification {
    pub fn is_application_update(&self) -> bool {
        self.kind == APPLICATION_UPDATE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Profile {
        #[serde(rename = "_id", alias = "id", default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Id(String),
}

impl Author {
    pub fn display(&self) -> &str {
        match self {
            Author::Profile { name: Some(name), .. } => name,
            Author::Profile { id: Some(id), .. } => id,
            Author::Profile { .. } => "anonymous",
            Author::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Accepts `2025-03-01` as well as full RFC 3339 timestamps.
pub fn deserialize_deadline<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_deadline(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid deadline: {raw}")))
}

pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
