pub mod approval;
pub mod executor;
pub mod transitions;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Ticket domain. Each domain owns an independent transition table;
/// the tables are data, edited per domain, never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketDomain {
    Purchasing,
    Hr,
    Claims,
}

impl TicketDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchasing => "purchasing",
            Self::Hr => "hr",
            Self::Claims => "claims",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchasing" => Some(Self::Purchasing),
            "hr" => Some(Self::Hr),
            "claims" => Some(Self::Claims),
            _ => None,
        }
    }

    /// Prefix used when generating ticket numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            Self::Purchasing => "PUR",
            Self::Hr => "RH",
            Self::Claims => "SIN",
        }
    }
}

/// Union of the three domains' status sets. A status is only meaningful
/// for a domain if that domain's transition table knows it; anything
/// else behaves as unknown (empty transition set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    AwaitingApprovalEncarregado,
    AwaitingApprovalSupervisor,
    AwaitingApprovalGerente,
    AwaitingTriage,
    Quoting,
    QuotationReview,
    Approved,
    Ordered,
    InTransit,
    Delivered,
    UnderEvaluation,
    InProgress,
    InAnalysis,
    InInvestigation,
    Resolved,
    Denied,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingApprovalEncarregado => "awaiting_approval_encarregado",
            Self::AwaitingApprovalSupervisor => "awaiting_approval_supervisor",
            Self::AwaitingApprovalGerente => "awaiting_approval_gerente",
            Self::AwaitingTriage => "awaiting_triage",
            Self::Quoting => "quoting",
            Self::QuotationReview => "quotation_review",
            Self::Approved => "approved",
            Self::Ordered => "ordered",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::UnderEvaluation => "under_evaluation",
            Self::InProgress => "in_progress",
            Self::InAnalysis => "in_analysis",
            Self::InInvestigation => "in_investigation",
            Self::Resolved => "resolved",
            Self::Denied => "denied",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_approval_encarregado" => Some(Self::AwaitingApprovalEncarregado),
            "awaiting_approval_supervisor" => Some(Self::AwaitingApprovalSupervisor),
            "awaiting_approval_gerente" => Some(Self::AwaitingApprovalGerente),
            "awaiting_triage" => Some(Self::AwaitingTriage),
            "quoting" => Some(Self::Quoting),
            "quotation_review" => Some(Self::QuotationReview),
            "approved" => Some(Self::Approved),
            "ordered" => Some(Self::Ordered),
            "in_transit" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            "under_evaluation" => Some(Self::UnderEvaluation),
            "in_progress" => Some(Self::InProgress),
            "in_analysis" => Some(Self::InAnalysis),
            "in_investigation" => Some(Self::InInvestigation),
            "resolved" => Some(Self::Resolved),
            "denied" => Some(Self::Denied),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses never have outgoing transitions in any domain.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Company roles as forwarded by the auth proxy. Funcionario is a
/// regular employee with no approval level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Funcionario,
    Encarregado,
    Supervisor,
    Gerente,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Funcionario => "funcionario",
            Self::Encarregado => "encarregado",
            Self::Supervisor => "supervisor",
            Self::Gerente => "gerente",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "funcionario" => Some(Self::Funcionario),
            "encarregado" => Some(Self::Encarregado),
            "supervisor" => Some(Self::Supervisor),
            "gerente" => Some(Self::Gerente),
            _ => None,
        }
    }

    pub fn can_triage(&self) -> bool {
        matches!(self, Self::Gerente)
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Gerente)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// Typed workflow failures. Every variant is a terminal outcome for the
/// invocation; callers map the message to the user and resubmit.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::IllegalTransition { .. } | Self::InsufficientStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<diesel::result::Error> for WorkflowError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}
