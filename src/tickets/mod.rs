use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, put},
    Json, Router,
};

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::{
    ClaimDetail, HistoryEntry, HrDetail, Ticket, TicketApproval, TicketComment, TicketQuotation,
    UniformItem,
};
use crate::shared::schema::{
    claim_details, hr_details, ticket_approvals, ticket_comments, ticket_history,
    ticket_quotations, tickets, uniform_items,
};
use crate::shared::state::AppState;
use crate::workflow::executor::{self, Actor};
use crate::workflow::{
    approval, ApprovalDecision, ApprovalStatus, Priority, Role, TicketDomain, TicketStatus,
    WorkflowError,
};

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub domain: String,
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub hr_detail: Option<HrDetailRequest>,
    pub claim_detail: Option<ClaimDetailRequest>,
}

#[derive(Debug, Deserialize)]
pub struct HrDetailRequest {
    pub rh_type: String,
    pub uniform_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimDetailRequest {
    pub policy_number: String,
    pub incident_date: NaiveDate,
    pub claimed_amount: Option<BigDecimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub domain: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub reason: Option<String>,
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    pub priority: String,
    pub assigned_to: Uuid,
    pub due_date: Option<DateTime<Utc>>,
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DecideApprovalRequest {
    pub decision: ApprovalDecision,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub is_internal: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub supplier_name: String,
    pub amount: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketFull {
    pub ticket: Ticket,
    pub approvals: Vec<TicketApproval>,
    pub history: Vec<HistoryEntry>,
    pub comments: Vec<TicketComment>,
    pub quotations: Vec<TicketQuotation>,
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, WorkflowError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| WorkflowError::Unauthorized("missing x-user-id header".to_string()))?;
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .ok_or_else(|| WorkflowError::Unauthorized("missing x-user-role header".to_string()))?;
    let name = headers
        .get("x-user-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    Ok(Actor { id, name, role })
}

fn get_conn(
    state: &AppState,
) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, WorkflowError>
{
    state
        .conn
        .get()
        .map_err(|e| WorkflowError::Database(e.to_string()))
}

fn generate_ticket_number(
    conn: &mut PgConnection,
    domain: TicketDomain,
) -> Result<String, WorkflowError> {
    let count: i64 = tickets::table
        .filter(tickets::domain.eq(domain.as_str()))
        .count()
        .get_result(conn)?;
    Ok(format!("{}-{:06}", domain.number_prefix(), count + 1))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<TicketFull>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;

    let domain = TicketDomain::parse(&req.domain)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown domain {}", req.domain)))?;
    if req.subject.trim().is_empty() {
        return Err(WorkflowError::Validation("subject is required".to_string()));
    }
    let priority = match req.priority.as_deref() {
        Some(p) => Priority::parse(p)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown priority {p}")))?,
        None => Priority::Medium,
    };
    match domain {
        TicketDomain::Hr if req.hr_detail.is_none() => {
            return Err(WorkflowError::Validation(
                "hr tickets require hr_detail".to_string(),
            ));
        }
        TicketDomain::Claims if req.claim_detail.is_none() => {
            return Err(WorkflowError::Validation(
                "claim tickets require claim_detail".to_string(),
            ));
        }
        _ => {}
    }

    let now = Utc::now();
    let entry_status = approval::entry_status(actor.role);
    let ticket_id = Uuid::new_v4();

    let ticket = conn.transaction::<Ticket, WorkflowError, _>(|conn| {
        let ticket_number = generate_ticket_number(conn, domain)?;
        let ticket = Ticket {
            id: ticket_id,
            ticket_number,
            domain: domain.as_str().to_string(),
            subject: req.subject.trim().to_string(),
            description: req.description.clone(),
            status: entry_status.as_str().to_string(),
            priority: priority.as_str().to_string(),
            requester_id: actor.id,
            requester_name: actor.name.clone(),
            assigned_to: None,
            due_date: None,
            denial_reason: None,
            version: 0,
            resolved_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(tickets::table)
            .values(&ticket)
            .execute(conn)?;

        for level in approval::ladder_for(actor.role) {
            let record = TicketApproval {
                id: Uuid::new_v4(),
                ticket_id,
                approval_level: level.as_i32(),
                approval_role: level.role().as_str().to_string(),
                status: ApprovalStatus::Pending.as_str().to_string(),
                notes: None,
                decided_by: None,
                decided_at: None,
                version: 0,
                created_at: now,
            };
            diesel::insert_into(ticket_approvals::table)
                .values(&record)
                .execute(conn)?;
        }

        if let Some(detail) = &req.hr_detail {
            let row = HrDetail {
                id: Uuid::new_v4(),
                ticket_id,
                rh_type: detail.rh_type.clone(),
                uniform_item_id: detail.uniform_item_id,
                quantity: detail.quantity,
            };
            diesel::insert_into(hr_details::table)
                .values(&row)
                .execute(conn)?;
        }
        if let Some(detail) = &req.claim_detail {
            let row = ClaimDetail {
                id: Uuid::new_v4(),
                ticket_id,
                policy_number: detail.policy_number.clone(),
                incident_date: detail.incident_date,
                claimed_amount: detail.claimed_amount.clone(),
            };
            diesel::insert_into(claim_details::table)
                .values(&row)
                .execute(conn)?;
        }

        let entry = executor::history_row(
            ticket_id,
            "created",
            None,
            Some(entry_status.as_str()),
            &actor,
            json!({ "domain": domain.as_str() }),
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;

        Ok(ticket)
    })?;

    load_full(&mut conn, ticket.id).map(Json)
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = tickets::table.into_boxed();

    if let Some(domain) = query.domain {
        q = q.filter(tickets::domain.eq(domain));
    }
    if let Some(status) = query.status {
        q = q.filter(tickets::status.eq(status));
    }
    if let Some(assigned_to) = query.assigned_to {
        q = q.filter(tickets::assigned_to.eq(assigned_to));
    }
    if let Some(requester_id) = query.requester_id {
        q = q.filter(tickets::requester_id.eq(requester_id));
    }
    if let Some(search) = query.search {
        let pattern = format!("%{search}%");
        q = q.filter(
            tickets::subject
                .ilike(pattern.clone())
                .or(tickets::ticket_number.ilike(pattern)),
        );
    }

    let rows: Vec<Ticket> = q
        .order(tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(id))
        .first(&mut conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {id}")))?;
    Ok(Json(ticket))
}

fn load_full(conn: &mut PgConnection, id: Uuid) -> Result<TicketFull, WorkflowError> {
    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(id))
        .first(conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {id}")))?;
    let approvals: Vec<TicketApproval> = ticket_approvals::table
        .filter(ticket_approvals::ticket_id.eq(id))
        .order(ticket_approvals::approval_level.asc())
        .load(conn)?;
    let history: Vec<HistoryEntry> = ticket_history::table
        .filter(ticket_history::ticket_id.eq(id))
        .order(ticket_history::created_at.desc())
        .load(conn)?;
    let comments: Vec<TicketComment> = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq(id))
        .order(ticket_comments::created_at.asc())
        .load(conn)?;
    let quotations: Vec<TicketQuotation> = ticket_quotations::table
        .filter(ticket_quotations::ticket_id.eq(id))
        .order(ticket_quotations::created_at.asc())
        .load(conn)?;
    Ok(TicketFull {
        ticket,
        approvals,
        history,
        comments,
        quotations,
    })
}

pub async fn get_ticket_full(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketFull>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    load_full(&mut conn, id).map(Json)
}

pub async fn list_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<&'static str>>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;
    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(id))
        .first(&mut conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {id}")))?;
    let domain = TicketDomain::parse(&ticket.domain)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown domain {}", ticket.domain)))?;
    let status = TicketStatus::parse(&ticket.status)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown status {}", ticket.status)))?;
    let allowed = executor::allowed_for(domain, status, actor.role)
        .into_iter()
        .map(|s| s.as_str())
        .collect();
    Ok(Json(allowed))
}

pub async fn change_ticket_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Ticket>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;
    let requested = TicketStatus::parse(&req.status)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown status {}", req.status)))?;
    let ticket = executor::change_status(
        &mut conn,
        id,
        requested,
        &actor,
        req.reason.as_deref(),
        req.version,
    )?;
    Ok(Json(ticket))
}

pub async fn triage_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<TriageRequest>,
) -> Result<Json<Ticket>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;
    let priority = Priority::parse(&req.priority)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown priority {}", req.priority)))?;
    let ticket = executor::triage(
        &mut conn,
        id,
        priority,
        req.assigned_to,
        req.due_date,
        &actor,
        req.version,
    )?;
    Ok(Json(ticket))
}

pub async fn decide_ticket_approval(
    State(state): State<Arc<AppState>>,
    Path((id, approval_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(req): Json<DecideApprovalRequest>,
) -> Result<Json<TicketFull>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;
    executor::decide_approval(
        &mut conn,
        id,
        approval_id,
        req.decision,
        req.notes.as_deref(),
        &actor,
    )?;
    load_full(&mut conn, id).map(Json)
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<TicketComment>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;

    if req.content.trim().is_empty() {
        return Err(WorkflowError::Validation("comment is empty".to_string()));
    }
    tickets::table
        .filter(tickets::id.eq(ticket_id))
        .select(tickets::id)
        .first::<Uuid>(&mut conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {ticket_id}")))?;

    let now = Utc::now();
    let comment = TicketComment {
        id: Uuid::new_v4(),
        ticket_id,
        author_id: actor.id,
        author_name: actor.name.clone(),
        content: req.content.trim().to_string(),
        is_internal: req.is_internal.unwrap_or(false),
        created_at: now,
    };

    conn.transaction::<(), WorkflowError, _>(|conn| {
        diesel::insert_into(ticket_comments::table)
            .values(&comment)
            .execute(conn)?;
        let entry = executor::history_row(
            ticket_id,
            "commented",
            None,
            None,
            &actor,
            json!({ "is_internal": comment.is_internal }),
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;
        Ok(())
    })?;

    Ok(Json(comment))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<TicketComment>>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    let comments: Vec<TicketComment> = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq(ticket_id))
        .order(ticket_comments::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(comments))
}

pub async fn add_quotation(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CreateQuotationRequest>,
) -> Result<Json<TicketQuotation>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    let mut conn = get_conn(&state)?;

    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(ticket_id))
        .first(&mut conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {ticket_id}")))?;
    if ticket.domain != TicketDomain::Purchasing.as_str() {
        return Err(WorkflowError::Validation(
            "quotations only apply to purchasing tickets".to_string(),
        ));
    }
    let status = TicketStatus::parse(&ticket.status)
        .ok_or_else(|| WorkflowError::Validation(format!("unknown status {}", ticket.status)))?;
    if !matches!(status, TicketStatus::Quoting | TicketStatus::QuotationReview) {
        return Err(WorkflowError::Validation(format!(
            "quotations cannot be added while the ticket is {status}"
        )));
    }

    let quotation = TicketQuotation {
        id: Uuid::new_v4(),
        ticket_id,
        supplier_name: req.supplier_name,
        amount: req.amount,
        notes: req.notes,
        is_selected: false,
        created_at: Utc::now(),
    };

    let entry = executor::history_row(
        ticket_id,
        "quotation_added",
        None,
        None,
        &actor,
        json!({
            "supplier": quotation.supplier_name.clone(),
            "amount": quotation.amount.to_string(),
        }),
    );
    conn.transaction::<(), WorkflowError, _>(|conn| {
        diesel::insert_into(ticket_quotations::table)
            .values(&quotation)
            .execute(conn)?;
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;
        Ok(())
    })?;

    Ok(Json(quotation))
}

pub async fn list_quotations(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<TicketQuotation>>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    let rows: Vec<TicketQuotation> = ticket_quotations::table
        .filter(ticket_quotations::ticket_id.eq(ticket_id))
        .order(ticket_quotations::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

/// Marking a quotation as selected is an annotation on the ticket, not
/// a status transition.
pub async fn select_quotation(
    State(state): State<Arc<AppState>>,
    Path((ticket_id, quotation_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<TicketQuotation>, WorkflowError> {
    let actor = actor_from_headers(&headers)?;
    if !actor.role.can_manage() {
        return Err(WorkflowError::Unauthorized(
            "only a manager may select a quotation".to_string(),
        ));
    }
    let mut conn = get_conn(&state)?;

    let quotation: TicketQuotation = ticket_quotations::table
        .filter(ticket_quotations::id.eq(quotation_id))
        .filter(ticket_quotations::ticket_id.eq(ticket_id))
        .first(&mut conn)
        .map_err(|_| WorkflowError::NotFound(format!("quotation {quotation_id}")))?;

    conn.transaction::<(), WorkflowError, _>(|conn| {
        diesel::update(
            ticket_quotations::table.filter(ticket_quotations::ticket_id.eq(ticket_id)),
        )
        .set(ticket_quotations::is_selected.eq(false))
        .execute(conn)?;
        diesel::update(ticket_quotations::table.filter(ticket_quotations::id.eq(quotation_id)))
            .set(ticket_quotations::is_selected.eq(true))
            .execute(conn)?;
        let entry = executor::history_row(
            ticket_id,
            "quotation_selected",
            None,
            None,
            &actor,
            json!({ "quotation_id": quotation_id, "supplier": quotation.supplier_name }),
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;
        Ok(())
    })?;

    let updated: TicketQuotation = ticket_quotations::table
        .filter(ticket_quotations::id.eq(quotation_id))
        .first(&mut conn)?;
    Ok(Json(updated))
}

pub async fn list_uniform_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UniformItem>>, WorkflowError> {
    let mut conn = get_conn(&state)?;
    let items: Vec<UniformItem> = uniform_items::table
        .order(uniform_items::name.asc())
        .load(&mut conn)?;
    Ok(Json(items))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/:id", get(get_ticket))
        .route("/api/tickets/:id/full", get(get_ticket_full))
        .route("/api/tickets/:id/transitions", get(list_transitions))
        .route("/api/tickets/:id/status", put(change_ticket_status))
        .route("/api/tickets/:id/triage", put(triage_ticket))
        .route(
            "/api/tickets/:id/approvals/:approval_id",
            put(decide_ticket_approval),
        )
        .route(
            "/api/tickets/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/tickets/:id/quotations",
            get(list_quotations).post(add_quotation),
        )
        .route(
            "/api/tickets/:id/quotations/:quotation_id/select",
            put(select_quotation),
        )
        .route("/api/uniform-items", get(list_uniform_items))
}
