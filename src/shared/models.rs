use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{
    claim_details, hr_details, ticket_approvals, ticket_comments, ticket_history,
    ticket_quotations, tickets, uniform_items,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_number: String,
    pub domain: String,
    pub subject: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,
    pub version: i32,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = ticket_approvals)]
pub struct TicketApproval {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub approval_level: i32,
    pub approval_role: String,
    pub status: String,
    pub notes: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row. Written by the transition executor, never
/// updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_history)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_comments)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_quotations)]
pub struct TicketQuotation {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub supplier_name: String,
    pub amount: BigDecimal,
    pub notes: Option<String>,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = uniform_items)]
pub struct UniformItem {
    pub id: Uuid,
    pub name: String,
    pub size: String,
    pub current_stock: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = hr_details)]
pub struct HrDetail {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub rh_type: String,
    pub uniform_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = claim_details)]
pub struct ClaimDetail {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub policy_number: String,
    pub incident_date: NaiveDate,
    pub claimed_amount: Option<BigDecimal>,
}
