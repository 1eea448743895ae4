use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::TicketsError;

pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Statuses an assignment may carry explicitly instead of the
    /// automatic promotion to in-progress.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(format!("Invalid status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("Invalid priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: Uuid,
    pub text: String,
    pub posted_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub comments: Vec<TicketComment>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    pub fn is_assignee(&self, user_id: Uuid) -> bool {
        self.assigned_to == Some(user_id)
    }
}

/// The updatable parts of a ticket, as named in authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TicketField {
    AssignedTo,
    Title,
    Description,
    Status,
    Priority,
    Comment,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<String>,
}

/// Raw update body. Empty strings and nulls count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assigned_to: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub comment: Option<String>,
}

/// A validated update: every present field is well-formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    pub assigned_to: Option<Uuid>,
    pub status: Option<TicketStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub comment: Option<String>,
}

impl TicketUpdate {
    pub fn requested_fields(&self) -> BTreeSet<TicketField> {
        let mut fields = BTreeSet::new();
        if self.assigned_to.is_some() {
            fields.insert(TicketField::AssignedTo);
        }
        if self.status.is_some() {
            fields.insert(TicketField::Status);
        }
        if self.title.is_some() {
            fields.insert(TicketField::Title);
        }
        if self.description.is_some() {
            fields.insert(TicketField::Description);
        }
        if self.priority.is_some() {
            fields.insert(TicketField::Priority);
        }
        if self.comment.is_some() {
            fields.insert(TicketField::Comment);
        }
        fields
    }
}

pub(crate) fn validate_title(raw: &str) -> Result<String, TicketsError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TicketsError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(TicketsError::Validation(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_description(raw: &str) -> Result<String, TicketsError> {
    if raw.trim().is_empty() {
        return Err(TicketsError::Validation("Description is required".into()));
    }
    if raw.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(TicketsError::Validation(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(raw.to_string())
}

pub(crate) fn parse_priority(raw: &str) -> Result<TicketPriority, TicketsError> {
    raw.trim().parse().map_err(TicketsError::Validation)
}

impl TryFrom<UpdateTicketRequest> for TicketUpdate {
    type Error = TicketsError;

    fn try_from(req: UpdateTicketRequest) -> Result<Self, Self::Error> {
        let assigned_to = req
            .assigned_to
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .map_err(|_| TicketsError::Validation(format!("Invalid assignee id: {raw}")))
            })
            .transpose()?;
        let status = req
            .status
            .map(|raw| raw.trim().parse::<TicketStatus>())
            .transpose()
            .map_err(TicketsError::Validation)?;
        let priority = req.priority.as_deref().map(parse_priority).transpose()?;
        let title = req.title.as_deref().map(validate_title).transpose()?;
        let description = req
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;

        Ok(Self {
            assigned_to,
            status,
            title,
            description,
            priority,
            comment: req.comment,
        })
    }
}

/// Per-status counts over the tickets a caller can list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: u64,
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub closed: u64,
}

impl TicketStats {
    pub fn record(&mut self, status: TicketStatus) {
        self.total += 1;
        match status {
            TicketStatus::Open => self.open += 1,
            TicketStatus::InProgress => self.in_progress += 1,
            TicketStatus::Resolved => self.resolved += 1,
            TicketStatus::Closed => self.closed += 1,
        }
    }
}

impl FromIterator<TicketStatus> for TicketStats {
    fn from_iter<I: IntoIterator<Item = TicketStatus>>(iter: I) -> Self {
        let mut stats = Self::default();
        for status in iter {
            stats.record(status);
        }
        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTicketResponse {
    pub message: String,
    pub id: Uuid,
}
