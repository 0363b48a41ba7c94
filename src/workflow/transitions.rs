//! Per-domain transition tables. Each table is immutable data: a status
//! maps to the list of statuses reachable in one step, in the order the
//! UI presents them. Membership is the only thing that matters for
//! validity. A status the domain does not know yields the empty set.

use super::{TicketDomain, TicketStatus};

use TicketStatus::*;

pub fn allowed_transitions(domain: TicketDomain, status: TicketStatus) -> &'static [TicketStatus] {
    match domain {
        TicketDomain::Purchasing => purchasing(status),
        TicketDomain::Hr => hr(status),
        TicketDomain::Claims => claims(status),
    }
}

pub fn is_allowed(domain: TicketDomain, from: TicketStatus, to: TicketStatus) -> bool {
    allowed_transitions(domain, from).contains(&to)
}

/// Statuses the domain's table knows, for validation and UI listings.
pub fn statuses(domain: TicketDomain) -> &'static [TicketStatus] {
    match domain {
        TicketDomain::Purchasing => &[
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
            Resolved,
            Denied,
            Closed,
            Cancelled,
        ],
        TicketDomain::Hr => &[
            AwaitingApprovalEncarregado,
            AwaitingApprovalSupervisor,
            AwaitingApprovalGerente,
            AwaitingTriage,
            InProgress,
            Resolved,
            Denied,
            Closed,
            Cancelled,
        ],
        TicketDomain::Claims => &[
            AwaitingApprovalEncarregado,
            AwaitingApprovalSupervisor,
            AwaitingApprovalGerente,
            AwaitingTriage,
            InAnalysis,
            InInvestigation,
            Resolved,
            Denied,
            Closed,
            Cancelled,
        ],
    }
}

fn purchasing(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        AwaitingApprovalEncarregado => &[AwaitingApprovalSupervisor, Denied, Cancelled],
        AwaitingApprovalSupervisor => &[AwaitingApprovalGerente, Denied, Cancelled],
        AwaitingApprovalGerente => &[AwaitingTriage, Denied, Cancelled],
        AwaitingTriage => &[Quoting, Cancelled],
        Quoting => &[QuotationReview, Cancelled],
        QuotationReview => &[Approved, Quoting, Denied],
        Approved => &[Ordered, Cancelled],
        Ordered => &[InTransit, Cancelled],
        InTransit => &[Delivered],
        Delivered => &[UnderEvaluation, Resolved],
        UnderEvaluation => &[Resolved],
        Resolved => &[Closed],
        Denied => &[AwaitingTriage],
        _ => &[],
    }
}

fn hr(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        AwaitingApprovalEncarregado => &[AwaitingApprovalSupervisor, Denied, Cancelled],
        AwaitingApprovalSupervisor => &[AwaitingApprovalGerente, Denied, Cancelled],
        AwaitingApprovalGerente => &[AwaitingTriage, Denied, Cancelled],
        AwaitingTriage => &[InProgress, Cancelled],
        InProgress => &[Resolved, Cancelled],
        Resolved => &[Closed],
        Denied => &[AwaitingTriage],
        _ => &[],
    }
}

// The in_analysis <-> in_investigation cycle is intentional: claims go
// back and forth between desk analysis and field investigation.
fn claims(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        AwaitingApprovalEncarregado => &[AwaitingApprovalSupervisor, Denied, Cancelled],
        AwaitingApprovalSupervisor => &[AwaitingApprovalGerente, Denied, Cancelled],
        AwaitingApprovalGerente => &[AwaitingTriage, Denied, Cancelled],
        AwaitingTriage => &[InAnalysis, Cancelled],
        InAnalysis => &[InInvestigation, Resolved, Denied],
        InInvestigation => &[InAnalysis],
        Resolved => &[Closed],
        Denied => &[AwaitingTriage],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAINS: [TicketDomain; 3] = [
        TicketDomain::Purchasing,
        TicketDomain::Hr,
        TicketDomain::Claims,
    ];

    #[test]
    fn test_purchasing_table() {
        let cases: &[(TicketStatus, &[TicketStatus])] = &[
            (
                AwaitingApprovalEncarregado,
                &[AwaitingApprovalSupervisor, Denied, Cancelled],
            ),
            (
                AwaitingApprovalSupervisor,
                &[AwaitingApprovalGerente, Denied, Cancelled],
            ),
            (AwaitingApprovalGerente, &[AwaitingTriage, Denied, Cancelled]),
            (AwaitingTriage, &[Quoting, Cancelled]),
            (Quoting, &[QuotationReview, Cancelled]),
            (QuotationReview, &[Approved, Quoting, Denied]),
            (Approved, &[Ordered, Cancelled]),
            (Ordered, &[InTransit, Cancelled]),
            (InTransit, &[Delivered]),
            (Delivered, &[UnderEvaluation, Resolved]),
            (UnderEvaluation, &[Resolved]),
            (Resolved, &[Closed]),
            (Denied, &[AwaitingTriage]),
            (Closed, &[]),
            (Cancelled, &[]),
        ];
        for (status, expected) in cases {
            assert_eq!(
                allowed_transitions(TicketDomain::Purchasing, *status),
                *expected,
                "purchasing {status}"
            );
        }
    }

    #[test]
    fn test_hr_core_chain() {
        assert!(is_allowed(TicketDomain::Hr, AwaitingTriage, InProgress));
        assert!(is_allowed(TicketDomain::Hr, InProgress, Resolved));
        assert!(is_allowed(TicketDomain::Hr, Resolved, Closed));
        assert!(!is_allowed(TicketDomain::Hr, AwaitingTriage, Resolved));
    }

    #[test]
    fn test_claims_investigation_cycle() {
        assert!(is_allowed(TicketDomain::Claims, InAnalysis, InInvestigation));
        assert!(is_allowed(TicketDomain::Claims, InInvestigation, InAnalysis));
        assert_eq!(
            allowed_transitions(TicketDomain::Claims, InInvestigation),
            &[InAnalysis][..]
        );
    }

    #[test]
    fn test_terminal_statuses_empty_everywhere() {
        for domain in DOMAINS {
            for status in statuses(domain) {
                if status.is_terminal() {
                    assert!(allowed_transitions(domain, *status).is_empty());
                }
            }
            assert!(allowed_transitions(domain, Closed).is_empty());
            assert!(allowed_transitions(domain, Cancelled).is_empty());
        }
    }

    #[test]
    fn test_denied_resubmission_everywhere() {
        for domain in DOMAINS {
            assert_eq!(allowed_transitions(domain, Denied), &[AwaitingTriage][..]);
        }
    }

    #[test]
    fn test_unknown_status_for_domain_is_empty() {
        // Statuses from other domains' tables are unknown here.
        assert!(allowed_transitions(TicketDomain::Hr, Quoting).is_empty());
        assert!(allowed_transitions(TicketDomain::Claims, Ordered).is_empty());
        assert!(allowed_transitions(TicketDomain::Purchasing, InAnalysis).is_empty());
    }

    #[test]
    fn test_every_edge_targets_a_known_status() {
        for domain in DOMAINS {
            for status in statuses(domain) {
                for next in allowed_transitions(domain, *status) {
                    assert!(
                        statuses(domain).contains(next),
                        "{} table routes {status} to unknown {next}",
                        domain.as_str()
                    );
                }
            }
        }
    }
}
