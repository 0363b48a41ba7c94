//! Transition executor: the single authorized mutation point for ticket
//! status. Validation is pure and synchronous; the status write, its
//! domain side effects and the audit row are applied together in one
//! database transaction, guarded by an optimistic version check.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde_json::json;
use uuid::Uuid;

use super::{
    approval, transitions, ApprovalDecision, ApprovalStatus, Priority, Role, TicketDomain,
    TicketStatus, WorkflowError,
};
use crate::shared::models::{HistoryEntry, Ticket, TicketApproval};
use crate::shared::schema::{
    hr_details, ticket_approvals, ticket_history, ticket_quotations, tickets, uniform_items,
};

/// Acting user, resolved from the forwarded identity headers.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

pub fn check_transition(
    domain: TicketDomain,
    from: TicketStatus,
    to: TicketStatus,
) -> Result<(), WorkflowError> {
    if transitions::is_allowed(domain, from, to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Denials always carry a reason. Returns the trimmed reason when one is
/// required, None when the target status does not need one.
pub fn check_reason(
    to: TicketStatus,
    reason: Option<&str>,
) -> Result<Option<String>, WorkflowError> {
    if to != TicketStatus::Denied {
        return Ok(reason.map(str::trim).filter(|r| !r.is_empty()).map(String::from));
    }
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => Ok(Some(r.to_string())),
        None => Err(WorkflowError::Validation(
            "a reason is required to deny a ticket".to_string(),
        )),
    }
}

/// Transitions only a manager may trigger: closing a ticket, deciding
/// the outcome of a quotation review, or denying outside the ladder.
pub fn requires_manager(from: TicketStatus, to: TicketStatus) -> bool {
    to == TicketStatus::Closed || to == TicketStatus::Denied || from == TicketStatus::QuotationReview
}

/// Status a triaged ticket moves into, per domain.
pub fn triage_target(domain: TicketDomain) -> TicketStatus {
    match domain {
        TicketDomain::Purchasing => TicketStatus::Quoting,
        TicketDomain::Hr => TicketStatus::InProgress,
        TicketDomain::Claims => TicketStatus::InAnalysis,
    }
}

/// Stock check for a uniform delivery. Returns the remaining stock;
/// refusal leaves the ledger untouched.
pub fn uniform_delivery(current_stock: i32, requested: i32) -> Result<i32, WorkflowError> {
    if requested <= 0 {
        return Err(WorkflowError::Validation(
            "requested quantity must be positive".to_string(),
        ));
    }
    if current_stock < requested {
        return Err(WorkflowError::InsufficientStock {
            available: current_stock,
            requested,
        });
    }
    Ok(current_stock - requested)
}

/// Purchase approval needs at least two recorded quotations.
pub fn quotation_gate(count: i64) -> Result<(), WorkflowError> {
    if count < 2 {
        return Err(WorkflowError::Validation(format!(
            "purchase approval requires at least 2 quotations, found {count}"
        )));
    }
    Ok(())
}

/// Allowed next statuses as presented to this actor. Approval-phase
/// moves are excluded (they go through the approval endpoint) and
/// manager-gated edges are hidden from non-managers.
pub fn allowed_for(domain: TicketDomain, from: TicketStatus, actor_role: Role) -> Vec<TicketStatus> {
    if approval::ApprovalLevel::from_status(from).is_some() {
        // Inside the approval phase only cancellation is a direct move.
        return transitions::allowed_transitions(domain, from)
            .iter()
            .copied()
            .filter(|to| *to == TicketStatus::Cancelled)
            .collect();
    }
    transitions::allowed_transitions(domain, from)
        .iter()
        .copied()
        .filter(|to| actor_role.can_manage() || !requires_manager(from, *to))
        .collect()
}

/// Outcome of a version-guarded update: zero rows hit means another
/// writer got there first and nothing changed.
pub fn cas_outcome(rows_updated: usize, what: &str) -> Result<(), WorkflowError> {
    if rows_updated == 0 {
        return Err(WorkflowError::Conflict(format!(
            "{what} was modified concurrently"
        )));
    }
    Ok(())
}

/// Build the single audit row a successful action appends.
pub fn history_row(
    ticket_id: Uuid,
    action: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    actor: &Actor,
    metadata: serde_json::Value,
) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4(),
        ticket_id,
        action: action.to_string(),
        old_value: old_value.map(String::from),
        new_value: new_value.map(String::from),
        actor_id: actor.id,
        actor_name: actor.name.clone(),
        metadata,
        created_at: Utc::now(),
    }
}

fn load_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> Result<Ticket, WorkflowError> {
    tickets::table
        .filter(tickets::id.eq(ticket_id))
        .first(conn)
        .map_err(|_| WorkflowError::NotFound(format!("ticket {ticket_id}")))
}

fn parse_ticket(ticket: &Ticket) -> Result<(TicketDomain, TicketStatus), WorkflowError> {
    let domain = TicketDomain::parse(&ticket.domain).ok_or_else(|| {
        WorkflowError::Validation(format!("unknown ticket domain {}", ticket.domain))
    })?;
    let status = TicketStatus::parse(&ticket.status).ok_or_else(|| {
        WorkflowError::Validation(format!("unknown ticket status {}", ticket.status))
    })?;
    Ok((domain, status))
}

/// Compare-and-swap status write. Every field that depends on the new
/// status is written in the same statement; zero rows hit means another
/// writer got there first.
fn cas_status_write(
    conn: &mut PgConnection,
    ticket: &Ticket,
    expected_version: i32,
    to: TicketStatus,
    denial_reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let resolved_at = if to == TicketStatus::Resolved {
        Some(now)
    } else {
        ticket.resolved_at
    };
    let closed_at = if to == TicketStatus::Closed {
        Some(now)
    } else {
        ticket.closed_at
    };
    let updated = diesel::update(
        tickets::table
            .filter(tickets::id.eq(ticket.id))
            .filter(tickets::version.eq(expected_version)),
    )
    .set((
        tickets::status.eq(to.as_str()),
        tickets::denial_reason.eq(denial_reason),
        tickets::resolved_at.eq(resolved_at),
        tickets::closed_at.eq(closed_at),
        tickets::version.eq(expected_version + 1),
        tickets::updated_at.eq(now),
    ))
    .execute(conn)?;
    cas_outcome(updated, &format!("ticket {}", ticket.id))
}

/// Apply a requested status change. Side effects and the audit row
/// commit atomically with the status write or not at all.
pub fn change_status(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    requested: TicketStatus,
    actor: &Actor,
    reason: Option<&str>,
    expected_version: Option<i32>,
) -> Result<Ticket, WorkflowError> {
    let ticket = load_ticket(conn, ticket_id)?;
    let (domain, from) = parse_ticket(&ticket)?;

    check_transition(domain, from, requested)?;

    if approval::ApprovalLevel::from_status(from).is_some()
        && requested != TicketStatus::Cancelled
    {
        return Err(WorkflowError::Unauthorized(
            "approval decisions go through the approval endpoint".to_string(),
        ));
    }
    if from == TicketStatus::AwaitingTriage && requested == triage_target(domain) {
        return Err(WorkflowError::Validation(
            "triage requires priority and assignee; use the triage endpoint".to_string(),
        ));
    }
    if requested == TicketStatus::Cancelled {
        if ticket.requester_id != actor.id && !actor.role.can_manage() {
            return Err(WorkflowError::Unauthorized(
                "only the requester or a manager may cancel".to_string(),
            ));
        }
    } else if requires_manager(from, requested) && !actor.role.can_manage() {
        return Err(WorkflowError::Unauthorized(format!(
            "{} may not move a ticket to {requested}",
            actor.role.as_str()
        )));
    }

    let reason = check_reason(requested, reason)?;
    let expected = expected_version.unwrap_or(ticket.version);
    let now = Utc::now();

    let applied = conn.transaction::<Ticket, WorkflowError, _>(|conn| {
        if domain == TicketDomain::Purchasing
            && from == TicketStatus::QuotationReview
            && requested == TicketStatus::Approved
        {
            let count: i64 = ticket_quotations::table
                .filter(ticket_quotations::ticket_id.eq(ticket.id))
                .count()
                .get_result(conn)?;
            quotation_gate(count)?;
        }

        if domain == TicketDomain::Hr
            && from == TicketStatus::InProgress
            && requested == TicketStatus::Resolved
        {
            deliver_uniform_if_needed(conn, &ticket, now)?;
        }

        let denial_reason = if requested == TicketStatus::Denied {
            reason.clone()
        } else if from == TicketStatus::Denied {
            // Resubmission starts a fresh review.
            None
        } else {
            ticket.denial_reason.clone()
        };
        cas_status_write(conn, &ticket, expected, requested, denial_reason, now)?;

        let mut metadata = json!({});
        if let Some(r) = &reason {
            metadata = json!({ "reason": r });
        }
        let entry = history_row(
            ticket.id,
            "status_changed",
            Some(from.as_str()),
            Some(requested.as_str()),
            actor,
            metadata,
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;

        load_ticket(conn, ticket.id)
    })?;

    info!(
        "ticket {} {} -> {} by {}",
        applied.ticket_number,
        from.as_str(),
        requested.as_str(),
        actor.name
    );
    Ok(applied)
}

/// HR tickets for a uniform decrement the stock ledger in the same
/// transaction as the delivery; refusal rolls everything back.
fn deliver_uniform_if_needed(
    conn: &mut PgConnection,
    ticket: &Ticket,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let detail: Option<(String, Option<Uuid>, Option<i32>)> = hr_details::table
        .filter(hr_details::ticket_id.eq(ticket.id))
        .select((
            hr_details::rh_type,
            hr_details::uniform_item_id,
            hr_details::quantity,
        ))
        .first(conn)
        .optional()?;
    let Some((rh_type, item_id, quantity)) = detail else {
        return Ok(());
    };
    if rh_type != "uniform" {
        return Ok(());
    }
    let item_id = item_id.ok_or_else(|| {
        WorkflowError::Validation("uniform ticket has no uniform item".to_string())
    })?;
    let quantity = quantity.ok_or_else(|| {
        WorkflowError::Validation("uniform ticket has no quantity".to_string())
    })?;

    let current_stock: i32 = uniform_items::table
        .filter(uniform_items::id.eq(item_id))
        .select(uniform_items::current_stock)
        .first(conn)
        .map_err(|_| WorkflowError::NotFound(format!("uniform item {item_id}")))?;
    let remaining = uniform_delivery(current_stock, quantity)?;

    diesel::update(uniform_items::table.filter(uniform_items::id.eq(item_id)))
        .set((
            uniform_items::current_stock.eq(remaining),
            uniform_items::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Triage: assign priority and responsible party, moving the ticket out
/// of the intake phase into the domain's working status.
pub fn triage(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    priority: Priority,
    assigned_to: Uuid,
    due_date: Option<DateTime<Utc>>,
    actor: &Actor,
    expected_version: Option<i32>,
) -> Result<Ticket, WorkflowError> {
    let ticket = load_ticket(conn, ticket_id)?;
    let (domain, from) = parse_ticket(&ticket)?;
    let target = triage_target(domain);

    check_transition(domain, from, target)?;
    if !actor.role.can_triage() {
        return Err(WorkflowError::Unauthorized(format!(
            "{} may not triage tickets",
            actor.role.as_str()
        )));
    }

    let expected = expected_version.unwrap_or(ticket.version);
    let now = Utc::now();

    let applied = conn.transaction::<Ticket, WorkflowError, _>(|conn| {
        let updated = diesel::update(
            tickets::table
                .filter(tickets::id.eq(ticket.id))
                .filter(tickets::version.eq(expected)),
        )
        .set((
            tickets::status.eq(target.as_str()),
            tickets::priority.eq(priority.as_str()),
            tickets::assigned_to.eq(Some(assigned_to)),
            tickets::due_date.eq(due_date),
            tickets::version.eq(expected + 1),
            tickets::updated_at.eq(now),
        ))
        .execute(conn)?;
        cas_outcome(updated, &format!("ticket {}", ticket.id))?;

        let entry = history_row(
            ticket.id,
            "triaged",
            Some(from.as_str()),
            Some(target.as_str()),
            actor,
            json!({
                "priority": priority.as_str(),
                "assigned_to": assigned_to,
                "due_date": due_date,
            }),
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;

        load_ticket(conn, ticket.id)
    })?;

    info!(
        "ticket {} triaged to {} ({}) by {}",
        applied.ticket_number,
        target.as_str(),
        priority.as_str(),
        actor.name
    );
    Ok(applied)
}

/// Decide a pending approval. The ladder plans the outcome; the record
/// update, the ticket move and the audit row land in one transaction.
pub fn decide_approval(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    approval_id: Uuid,
    decision: ApprovalDecision,
    notes: Option<&str>,
    actor: &Actor,
) -> Result<Ticket, WorkflowError> {
    let ticket = load_ticket(conn, ticket_id)?;
    let (domain, from) = parse_ticket(&ticket)?;

    let record: TicketApproval = ticket_approvals::table
        .filter(ticket_approvals::id.eq(approval_id))
        .filter(ticket_approvals::ticket_id.eq(ticket_id))
        .first(conn)
        .map_err(|_| WorkflowError::NotFound(format!("approval {approval_id}")))?;
    let record_status = ApprovalStatus::parse(&record.status).ok_or_else(|| {
        WorkflowError::Validation(format!("unknown approval status {}", record.status))
    })?;

    let outcome = approval::decide(
        approval::ApprovalRef {
            level: record.approval_level,
            status: record_status,
        },
        from,
        actor.role,
        decision,
        notes,
    )?;
    check_transition(domain, from, outcome.next_ticket_status)?;

    let now = Utc::now();
    let notes = notes.map(str::trim).filter(|n| !n.is_empty()).map(String::from);

    let applied = conn.transaction::<Ticket, WorkflowError, _>(|conn| {
        let updated = diesel::update(
            ticket_approvals::table
                .filter(ticket_approvals::id.eq(record.id))
                .filter(ticket_approvals::version.eq(record.version)),
        )
        .set((
            ticket_approvals::status.eq(outcome.record_status.as_str()),
            ticket_approvals::notes.eq(notes.clone()),
            ticket_approvals::decided_by.eq(Some(actor.id)),
            ticket_approvals::decided_at.eq(Some(now)),
            ticket_approvals::version.eq(record.version + 1),
        ))
        .execute(conn)?;
        cas_outcome(updated, &format!("approval {}", record.id))?;

        let denial_reason = outcome
            .denial_reason
            .clone()
            .or_else(|| ticket.denial_reason.clone());
        cas_status_write(
            conn,
            &ticket,
            ticket.version,
            outcome.next_ticket_status,
            denial_reason,
            now,
        )?;

        let action = match decision {
            ApprovalDecision::Approved => "approval_approved",
            ApprovalDecision::Rejected => "approval_rejected",
        };
        let entry = history_row(
            ticket.id,
            action,
            Some(from.as_str()),
            Some(outcome.next_ticket_status.as_str()),
            actor,
            json!({ "level": record.approval_level, "notes": notes }),
        );
        diesel::insert_into(ticket_history::table)
            .values(&entry)
            .execute(conn)?;

        load_ticket(conn, ticket.id)
    })?;

    info!(
        "ticket {} approval level {} {} by {}",
        applied.ticket_number,
        record.approval_level,
        outcome.record_status.as_str(),
        actor.name
    );
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition_rejects_unknown_edges() {
        assert!(check_transition(
            TicketDomain::Purchasing,
            TicketStatus::AwaitingTriage,
            TicketStatus::Quoting
        )
        .is_ok());
        let err = check_transition(
            TicketDomain::Purchasing,
            TicketStatus::Closed,
            TicketStatus::AwaitingTriage,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
    }

    #[test]
    fn test_deny_requires_reason() {
        let err = check_reason(TicketStatus::Denied, None).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        let err = check_reason(TicketStatus::Denied, Some("  ")).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(
            check_reason(TicketStatus::Denied, Some(" over budget ")).unwrap(),
            Some("over budget".to_string())
        );
        assert_eq!(check_reason(TicketStatus::Closed, None).unwrap(), None);
    }

    #[test]
    fn test_uniform_delivery_refuses_short_stock() {
        let err = uniform_delivery(3, 5).unwrap_err();
        match err {
            WorkflowError::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_uniform_delivery_drains_stock_exactly() {
        assert_eq!(uniform_delivery(5, 5).unwrap(), 0);
        assert_eq!(uniform_delivery(10, 4).unwrap(), 6);
    }

    #[test]
    fn test_uniform_delivery_rejects_nonpositive_quantity() {
        assert!(matches!(
            uniform_delivery(5, 0),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_quotation_gate() {
        assert!(matches!(
            quotation_gate(0),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            quotation_gate(1),
            Err(WorkflowError::Validation(_))
        ));
        assert!(quotation_gate(2).is_ok());
        assert!(quotation_gate(5).is_ok());
    }

    #[test]
    fn test_manager_gated_edges() {
        assert!(requires_manager(TicketStatus::Resolved, TicketStatus::Closed));
        assert!(requires_manager(
            TicketStatus::QuotationReview,
            TicketStatus::Approved
        ));
        assert!(requires_manager(TicketStatus::InAnalysis, TicketStatus::Denied));
        assert!(!requires_manager(TicketStatus::Ordered, TicketStatus::InTransit));
    }

    #[test]
    fn test_allowed_for_hides_manager_edges() {
        let visible = allowed_for(
            TicketDomain::Purchasing,
            TicketStatus::Resolved,
            Role::Funcionario,
        );
        assert!(visible.is_empty());
        let visible = allowed_for(
            TicketDomain::Purchasing,
            TicketStatus::Resolved,
            Role::Gerente,
        );
        assert_eq!(visible, vec![TicketStatus::Closed]);
    }

    #[test]
    fn test_allowed_for_approval_phase_only_cancel() {
        let visible = allowed_for(
            TicketDomain::Hr,
            TicketStatus::AwaitingApprovalSupervisor,
            Role::Supervisor,
        );
        assert_eq!(visible, vec![TicketStatus::Cancelled]);
    }

    #[test]
    fn test_stale_version_surfaces_conflict() {
        let err = cas_outcome(0, "ticket PUR-000001").unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert!(err.to_string().contains("modified concurrently"));
        assert!(cas_outcome(1, "ticket PUR-000001").is_ok());
    }

    #[test]
    fn test_history_row_captures_old_and_new() {
        let actor = Actor {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            role: Role::Gerente,
        };
        let entry = history_row(
            Uuid::new_v4(),
            "status_changed",
            Some("quoting"),
            Some("quotation_review"),
            &actor,
            json!({}),
        );
        assert_eq!(entry.action, "status_changed");
        assert_eq!(entry.old_value.as_deref(), Some("quoting"));
        assert_eq!(entry.new_value.as_deref(), Some("quotation_review"));
        assert_eq!(entry.actor_name, "Ana");
    }

    #[test]
    fn test_triage_targets() {
        assert_eq!(triage_target(TicketDomain::Purchasing), TicketStatus::Quoting);
        assert_eq!(triage_target(TicketDomain::Hr), TicketStatus::InProgress);
        assert_eq!(triage_target(TicketDomain::Claims), TicketStatus::InAnalysis);
    }
}
