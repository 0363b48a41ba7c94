#[cfg(test)]
mod workflow_scenario_tests {
    use deskserver::workflow::approval::{self, ApprovalRef};
    use deskserver::workflow::executor::{
        cas_outcome, check_reason, check_transition, history_row, quotation_gate, triage_target,
        uniform_delivery, Actor,
    };
    use deskserver::workflow::transitions::{allowed_transitions, is_allowed};
    use deskserver::workflow::{
        ApprovalDecision, ApprovalStatus, Role, TicketDomain, TicketStatus, WorkflowError,
    };
    use serde_json::json;
    use uuid::Uuid;

    fn pending(level: i32) -> ApprovalRef {
        ApprovalRef {
            level,
            status: ApprovalStatus::Pending,
        }
    }

    /// A funcionario's purchase request climbs the full ladder, gets
    /// triaged, quoted, approved and delivered.
    #[test]
    fn test_purchasing_lifecycle_end_to_end() {
        let domain = TicketDomain::Purchasing;
        let mut status = approval::entry_status(Role::Funcionario);
        assert_eq!(status, TicketStatus::AwaitingApprovalEncarregado);

        let ladder = approval::ladder_for(Role::Funcionario);
        assert_eq!(ladder.len(), 3);

        for (i, level) in ladder.iter().enumerate() {
            let deciding_role = level.role();
            let outcome = approval::decide(
                pending(level.as_i32()),
                status,
                deciding_role,
                ApprovalDecision::Approved,
                None,
            )
            .unwrap();
            assert!(is_allowed(domain, status, outcome.next_ticket_status));
            status = outcome.next_ticket_status;
            if i < 2 {
                assert!(approval::ApprovalLevel::from_status(status).is_some());
            }
        }
        assert_eq!(status, TicketStatus::AwaitingTriage);

        // Triage, then walk the execution chain. Each step yields one
        // audit row carrying the prior and the new status.
        assert_eq!(triage_target(domain), TicketStatus::Quoting);
        let actor = Actor {
            id: Uuid::new_v4(),
            name: "Marcos".to_string(),
            role: Role::Gerente,
        };
        let ticket_id = Uuid::new_v4();
        let path = [
            TicketStatus::Quoting,
            TicketStatus::QuotationReview,
            TicketStatus::Approved,
            TicketStatus::Ordered,
            TicketStatus::InTransit,
            TicketStatus::Delivered,
            TicketStatus::UnderEvaluation,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ];
        let mut audit = Vec::new();
        for next in path {
            check_transition(domain, status, next).unwrap();
            let entry = history_row(
                ticket_id,
                "status_changed",
                Some(status.as_str()),
                Some(next.as_str()),
                &actor,
                json!({}),
            );
            assert_eq!(entry.old_value.as_deref(), Some(status.as_str()));
            assert_eq!(entry.new_value.as_deref(), Some(next.as_str()));
            audit.push(entry);
            status = next;
        }
        assert_eq!(audit.len(), path.len());
        assert!(allowed_transitions(domain, status).is_empty());
    }

    /// A stale optimistic version never applies; the caller gets a
    /// conflict and must resubmit.
    #[test]
    fn test_concurrent_write_surfaces_conflict() {
        let err = cas_outcome(0, "ticket RH-000042").unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert!(cas_outcome(1, "ticket RH-000042").is_ok());
    }

    /// Approving the quotation review stage is refused until two
    /// quotations exist.
    #[test]
    fn test_purchase_approval_needs_two_quotations() {
        check_transition(
            TicketDomain::Purchasing,
            TicketStatus::QuotationReview,
            TicketStatus::Approved,
        )
        .unwrap();
        assert!(matches!(
            quotation_gate(1),
            Err(WorkflowError::Validation(_))
        ));
        assert!(quotation_gate(2).is_ok());
    }

    /// A supervisor rejection sends the ticket to denied; resubmission
    /// re-enters triage in every domain.
    #[test]
    fn test_rejection_and_resubmission() {
        let outcome = approval::decide(
            pending(2),
            TicketStatus::AwaitingApprovalSupervisor,
            Role::Supervisor,
            ApprovalDecision::Rejected,
            Some("no budget this quarter"),
        )
        .unwrap();
        assert_eq!(outcome.next_ticket_status, TicketStatus::Denied);
        assert_eq!(
            outcome.denial_reason.as_deref(),
            Some("no budget this quarter")
        );

        for domain in [
            TicketDomain::Purchasing,
            TicketDomain::Hr,
            TicketDomain::Claims,
        ] {
            assert!(is_allowed(domain, TicketStatus::Denied, TicketStatus::AwaitingTriage));
        }
    }

    /// Direct denials carry a mandatory reason; the stock ledger refuses
    /// a delivery it cannot cover.
    #[test]
    fn test_hr_uniform_delivery_rules() {
        assert_eq!(triage_target(TicketDomain::Hr), TicketStatus::InProgress);
        check_transition(TicketDomain::Hr, TicketStatus::InProgress, TicketStatus::Resolved)
            .unwrap();

        let err = uniform_delivery(3, 5).unwrap_err();
        assert!(matches!(err, WorkflowError::InsufficientStock { .. }));
        assert_eq!(uniform_delivery(5, 5).unwrap(), 0);

        let err = check_reason(TicketStatus::Denied, None).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    /// Claims tickets may loop between analysis and field investigation
    /// before resolving.
    #[test]
    fn test_claims_analysis_loop() {
        let domain = TicketDomain::Claims;
        let mut status = TicketStatus::InAnalysis;
        for _ in 0..2 {
            check_transition(domain, status, TicketStatus::InInvestigation).unwrap();
            status = TicketStatus::InInvestigation;
            check_transition(domain, status, TicketStatus::InAnalysis).unwrap();
            status = TicketStatus::InAnalysis;
        }
        check_transition(domain, status, TicketStatus::Resolved).unwrap();
    }

    /// Nobody outside the pending level may decide, and decided records
    /// stay decided.
    #[test]
    fn test_ladder_gating_is_strict() {
        let status = TicketStatus::AwaitingApprovalGerente;
        for role in [Role::Funcionario, Role::Encarregado, Role::Supervisor] {
            assert!(!approval::can_decide(pending(3), status, role));
        }
        assert!(approval::can_decide(pending(3), status, Role::Gerente));

        let decided = ApprovalRef {
            level: 3,
            status: ApprovalStatus::Rejected,
        };
        assert!(!approval::can_decide(decided, status, Role::Gerente));
    }
}
