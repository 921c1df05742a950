use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sentinel `claimed_by` value meaning "promoted by the tick but not yet
/// picked up by a gateway". Part of the domain alphabet, not a magic string
/// sprinkled through call sites — see [`ClaimedBy`].
pub const GATEWAY_PENDING: &str = "gateway_pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Queued,
    Accepted,
    Sent,
    Delivered,
    Received,
    Failed,
    Canceled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Sent | Status::Delivered | Status::Received | Status::Failed | Status::Canceled
        )
    }

    pub fn is_sent_class(self) -> bool {
        matches!(self, Status::Sent | Status::Delivered | Status::Received)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "QUEUED",
            Status::Accepted => "ACCEPTED",
            Status::Sent => "SENT",
            Status::Delivered => "DELIVERED",
            Status::Received => "RECEIVED",
            Status::Failed => "FAILED",
            Status::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// Who, if anyone, owns an ACCEPTED message. Modeled explicitly rather than
/// as a bare `Option<String>` with a magic sentinel string compared at every
/// call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedBy {
    Unowned,
    Pending,
    OwnedBy(String),
}

impl ClaimedBy {
    pub fn from_column(claimed_by: Option<&str>) -> Self {
        match claimed_by {
            None => ClaimedBy::Unowned,
            Some(GATEWAY_PENDING) => ClaimedBy::Pending,
            Some(id) => ClaimedBy::OwnedBy(id.to_string()),
        }
    }

    pub fn as_column(&self) -> Option<&str> {
        match self {
            ClaimedBy::Unowned => None,
            ClaimedBy::Pending => Some(GATEWAY_PENDING),
            ClaimedBy::OwnedBy(id) => Some(id.as_str()),
        }
    }
}

/// Row shape as stored in `scheduled_messages`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, ToSchema)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub to_handle: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

impl ScheduledMessage {
    pub fn claimed_by(&self) -> ClaimedBy {
        ClaimedBy::from_column(self.claimed_by.as_deref())
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, ToSchema)]
pub struct MessageStatusEvent {
    pub id: i64,
    pub message_id: Uuid,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    pub detail: Json,
}

/// The payload handed to a gateway by claim; a narrower view than the full
/// row, matching the wire contract in the external-interfaces section.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimedMessage {
    pub id: Uuid,
    pub to_handle: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
}

impl From<ScheduledMessage> for ClaimedMessage {
    fn from(m: ScheduledMessage) -> Self {
        Self {
            id: m.id,
            to_handle: m.to_handle,
            body: m.body,
            scheduled_for: m.scheduled_for,
        }
    }
}

/// Statuses a gateway is permitted to report. QUEUED/ACCEPTED/CANCELED are
/// not reportable outcomes -- they only ever happen inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportableStatus {
    Sent,
    Delivered,
    Received,
    Failed,
}

impl ReportableStatus {
    pub fn as_status(self) -> Status {
        match self {
            ReportableStatus::Sent => Status::Sent,
            ReportableStatus::Delivered => Status::Delivered,
            ReportableStatus::Received => Status::Received,
            ReportableStatus::Failed => Status::Failed,
        }
    }

    /// Parses the wire representation of a reported status, rejecting
    /// QUEUED/ACCEPTED/CANCELED (and anything else unrecognized) the same
    /// way an unknown enum variant would be rejected by serde, but with a
    /// message that names the bad value.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_uppercase().as_str() {
            "SENT" => Ok(ReportableStatus::Sent),
            "DELIVERED" => Ok(ReportableStatus::Delivered),
            "RECEIVED" => Ok(ReportableStatus::Received),
            "FAILED" => Ok(ReportableStatus::Failed),
            other => Err(format!("'{other}' is not a reportable status")),
        }
    }
}
