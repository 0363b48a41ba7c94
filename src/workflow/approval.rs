//! Approval ladder: the ordered role-gated levels a ticket climbs before
//! triage. This module owns the role <-> level <-> status mapping; no
//! other module may duplicate it.

use super::{ApprovalDecision, ApprovalStatus, Role, TicketStatus, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ApprovalLevel {
    Encarregado = 1,
    Supervisor = 2,
    Gerente = 3,
}

impl ApprovalLevel {
    pub const FINAL: ApprovalLevel = ApprovalLevel::Gerente;

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(level: i32) -> Option<Self> {
        match level {
            1 => Some(Self::Encarregado),
            2 => Some(Self::Supervisor),
            3 => Some(Self::Gerente),
            _ => None,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Encarregado => Role::Encarregado,
            Self::Supervisor => Role::Supervisor,
            Self::Gerente => Role::Gerente,
        }
    }

    pub fn from_role(role: Role) -> Option<Self> {
        match role {
            Role::Funcionario => None,
            Role::Encarregado => Some(Self::Encarregado),
            Role::Supervisor => Some(Self::Supervisor),
            Role::Gerente => Some(Self::Gerente),
        }
    }

    /// The ticket status that marks this level as the pending one.
    pub fn status(&self) -> TicketStatus {
        match self {
            Self::Encarregado => TicketStatus::AwaitingApprovalEncarregado,
            Self::Supervisor => TicketStatus::AwaitingApprovalSupervisor,
            Self::Gerente => TicketStatus::AwaitingApprovalGerente,
        }
    }

    pub fn from_status(status: TicketStatus) -> Option<Self> {
        match status {
            TicketStatus::AwaitingApprovalEncarregado => Some(Self::Encarregado),
            TicketStatus::AwaitingApprovalSupervisor => Some(Self::Supervisor),
            TicketStatus::AwaitingApprovalGerente => Some(Self::Gerente),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Self> {
        Self::from_i32(self.as_i32() + 1)
    }
}

/// The slice of an approval record the ladder needs to reason about.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalRef {
    pub level: i32,
    pub status: ApprovalStatus,
}

/// What a decision does to the record and to the ticket. The executor
/// applies this plan inside one transaction.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub record_status: ApprovalStatus,
    pub next_ticket_status: TicketStatus,
    pub denial_reason: Option<String>,
}

/// True only when the record is pending, the ticket sits at the record's
/// level, and the actor's role is that level's role. Any mismatch is a
/// silent false; the UI hides the action instead of raising.
pub fn can_decide(record: ApprovalRef, ticket_status: TicketStatus, actor_role: Role) -> bool {
    if record.status != ApprovalStatus::Pending {
        return false;
    }
    let Some(pending_level) = ApprovalLevel::from_status(ticket_status) else {
        return false;
    };
    if pending_level.as_i32() != record.level {
        return false;
    }
    ApprovalLevel::from_role(actor_role) == Some(pending_level)
}

/// Plan a decision. Rejection always requires a reason; approval at the
/// final level moves the ticket out of the approval phase into triage.
pub fn decide(
    record: ApprovalRef,
    ticket_status: TicketStatus,
    actor_role: Role,
    decision: ApprovalDecision,
    notes: Option<&str>,
) -> Result<ApprovalOutcome, WorkflowError> {
    if !can_decide(record, ticket_status, actor_role) {
        return Err(WorkflowError::Unauthorized(format!(
            "{} cannot decide approval level {}",
            actor_role.as_str(),
            record.level
        )));
    }
    let level = ApprovalLevel::from_i32(record.level).ok_or_else(|| {
        WorkflowError::Validation(format!("unknown approval level {}", record.level))
    })?;

    match decision {
        ApprovalDecision::Rejected => {
            let reason = notes.map(str::trim).unwrap_or_default();
            if reason.is_empty() {
                return Err(WorkflowError::Validation(
                    "rejection requires a reason".to_string(),
                ));
            }
            Ok(ApprovalOutcome {
                record_status: ApprovalStatus::Rejected,
                next_ticket_status: TicketStatus::Denied,
                denial_reason: Some(reason.to_string()),
            })
        }
        ApprovalDecision::Approved => {
            let next_ticket_status = match level.next() {
                Some(next) => next.status(),
                None => TicketStatus::AwaitingTriage,
            };
            Ok(ApprovalOutcome {
                record_status: ApprovalStatus::Approved,
                next_ticket_status,
                denial_reason: None,
            })
        }
    }
}

/// Where a freshly created ticket enters the workflow: one level above
/// the creator's own. A gerente skips the ladder entirely.
pub fn entry_status(creator_role: Role) -> TicketStatus {
    match ladder_for(creator_role).first() {
        Some(level) => level.status(),
        None => TicketStatus::AwaitingTriage,
    }
}

/// Pending levels to create at intake, contiguous from the creator's
/// level + 1 through gerente.
pub fn ladder_for(creator_role: Role) -> Vec<ApprovalLevel> {
    let first = match ApprovalLevel::from_role(creator_role) {
        None => ApprovalLevel::Encarregado,
        Some(own) => match own.next() {
            Some(next) => next,
            None => return Vec::new(),
        },
    };
    (first.as_i32()..=ApprovalLevel::FINAL.as_i32())
        .filter_map(ApprovalLevel::from_i32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(level: i32) -> ApprovalRef {
        ApprovalRef {
            level,
            status: ApprovalStatus::Pending,
        }
    }

    #[test]
    fn test_can_decide_only_matching_role() {
        let record = pending(2);
        let status = TicketStatus::AwaitingApprovalSupervisor;
        assert!(can_decide(record, status, Role::Supervisor));
        assert!(!can_decide(record, status, Role::Encarregado));
        assert!(!can_decide(record, status, Role::Gerente));
        assert!(!can_decide(record, status, Role::Funcionario));
    }

    #[test]
    fn test_can_decide_requires_pending_record() {
        let record = ApprovalRef {
            level: 2,
            status: ApprovalStatus::Approved,
        };
        assert!(!can_decide(
            record,
            TicketStatus::AwaitingApprovalSupervisor,
            Role::Supervisor
        ));
    }

    #[test]
    fn test_can_decide_requires_matching_ticket_status() {
        let record = pending(2);
        assert!(!can_decide(
            record,
            TicketStatus::AwaitingApprovalGerente,
            Role::Supervisor
        ));
        assert!(!can_decide(record, TicketStatus::AwaitingTriage, Role::Supervisor));
    }

    #[test]
    fn test_reject_without_notes_fails() {
        let err = decide(
            pending(1),
            TicketStatus::AwaitingApprovalEncarregado,
            Role::Encarregado,
            ApprovalDecision::Rejected,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err = decide(
            pending(1),
            TicketStatus::AwaitingApprovalEncarregado,
            Role::Encarregado,
            ApprovalDecision::Rejected,
            Some("   "),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_reject_moves_ticket_to_denied_with_reason() {
        let outcome = decide(
            pending(2),
            TicketStatus::AwaitingApprovalSupervisor,
            Role::Supervisor,
            ApprovalDecision::Rejected,
            Some("budget exceeded"),
        )
        .unwrap();
        assert_eq!(outcome.record_status, ApprovalStatus::Rejected);
        assert_eq!(outcome.next_ticket_status, TicketStatus::Denied);
        assert_eq!(outcome.denial_reason.as_deref(), Some("budget exceeded"));
    }

    #[test]
    fn test_approve_without_notes_succeeds() {
        let outcome = decide(
            pending(1),
            TicketStatus::AwaitingApprovalEncarregado,
            Role::Encarregado,
            ApprovalDecision::Approved,
            None,
        )
        .unwrap();
        assert_eq!(outcome.record_status, ApprovalStatus::Approved);
        assert_eq!(
            outcome.next_ticket_status,
            TicketStatus::AwaitingApprovalSupervisor
        );
        assert!(outcome.denial_reason.is_none());
    }

    #[test]
    fn test_final_approval_enters_triage() {
        let outcome = decide(
            pending(3),
            TicketStatus::AwaitingApprovalGerente,
            Role::Gerente,
            ApprovalDecision::Approved,
            None,
        )
        .unwrap();
        assert_eq!(outcome.next_ticket_status, TicketStatus::AwaitingTriage);
    }

    #[test]
    fn test_entry_status_by_creator_role() {
        assert_eq!(
            entry_status(Role::Funcionario),
            TicketStatus::AwaitingApprovalEncarregado
        );
        assert_eq!(
            entry_status(Role::Encarregado),
            TicketStatus::AwaitingApprovalSupervisor
        );
        assert_eq!(
            entry_status(Role::Supervisor),
            TicketStatus::AwaitingApprovalGerente
        );
        assert_eq!(entry_status(Role::Gerente), TicketStatus::AwaitingTriage);
    }

    #[test]
    fn test_ladder_levels_are_contiguous() {
        let levels = ladder_for(Role::Funcionario);
        assert_eq!(
            levels,
            vec![
                ApprovalLevel::Encarregado,
                ApprovalLevel::Supervisor,
                ApprovalLevel::Gerente
            ]
        );
        assert_eq!(
            ladder_for(Role::Supervisor),
            vec![ApprovalLevel::Gerente]
        );
        assert!(ladder_for(Role::Gerente).is_empty());
    }
}
