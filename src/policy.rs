//! # Admission Policy
//!
//! Decides, for an incoming request, what happens to it and to the requests
//! already queued or running. The decision is a pure function of the incoming
//! request and a snapshot of the active set; the execution queue evaluates it
//! and applies the result under one lock so that "scan, cancel matches, insert"
//! is atomic with respect to other enqueue calls.
//!
//! | Behaviour | Match | Result when matched |
//! |---|---|---|
//! | `Plain` | - | admit |
//! | `CancelIfSameTypeExists` | same kind | reject the new request |
//! | `CancelExistingOfSameType` | same kind, not itself | cancel matches, admit |
//! | `CancelExistingEqual` | structurally equal, not itself | cancel matches, admit |
//!
//! Matching is never retroactive: a request admitted later is unaffected by an
//! earlier request's behaviour.

use crate::ids::RequestId;
use crate::request::{HttpRequest, QueuingBehaviour};

/// Result of evaluating one incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Insert the request; nothing else is touched
    Admit,
    /// Cancel the incoming request; it never enters the queue
    Reject,
    /// Cancel the listed active requests, then insert the incoming one
    EvictThenAdmit(Vec<RequestId>),
}

impl Verdict {
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Verdict::Reject)
    }
}

/// Evaluate `incoming` against the requests currently queued or running.
///
/// `active` should only contain requests that have not been cancelled.
pub fn evaluate<'a, I>(incoming: &HttpRequest, active: I) -> Verdict
where
    I: IntoIterator<Item = &'a HttpRequest>,
{
    let others = active.into_iter().filter(|r| r.id() != incoming.id());

    match incoming.queuing_behaviour() {
        QueuingBehaviour::Plain => Verdict::Admit,
        QueuingBehaviour::CancelIfSameTypeExists => {
            let mut others = others;
            if others.any(|r| r.same_kind(incoming)) {
                Verdict::Reject
            } else {
                Verdict::Admit
            }
        }
        QueuingBehaviour::CancelExistingOfSameType => {
            evict(others.filter(|r| r.same_kind(incoming)))
        }
        QueuingBehaviour::CancelExistingEqual => evict(others.filter(|r| *r == incoming)),
    }
}

fn evict<'a>(matches: impl Iterator<Item = &'a HttpRequest>) -> Verdict {
    let ids: Vec<RequestId> = matches.map(HttpRequest::id).collect();
    if ids.is_empty() {
        Verdict::Admit
    } else {
        Verdict::EvictThenAdmit(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn login(behaviour: QueuingBehaviour) -> HttpRequest {
        HttpRequest::post("Login", "/login")
            .json(json!({ "user": "ada" }))
            .behaviour(behaviour)
    }

    fn feed(page: &str) -> HttpRequest {
        HttpRequest::get("FetchFeed", "/feed").query("page", page)
    }

    #[test]
    fn test_plain_always_admits() {
        let active = [login(QueuingBehaviour::Plain), feed("1")];
        let incoming = login(QueuingBehaviour::Plain);
        assert_eq!(evaluate(&incoming, &active), Verdict::Admit);
    }

    #[test]
    fn test_cancel_if_same_type_exists_rejects_on_match() {
        let active = [login(QueuingBehaviour::CancelIfSameTypeExists)];
        let incoming = login(QueuingBehaviour::CancelIfSameTypeExists);
        assert_eq!(evaluate(&incoming, &active), Verdict::Reject);
    }

    #[test]
    fn test_cancel_if_same_type_exists_admits_other_kinds() {
        let active = [feed("1"), feed("2")];
        let incoming = login(QueuingBehaviour::CancelIfSameTypeExists);
        assert_eq!(evaluate(&incoming, &active), Verdict::Admit);
    }

    #[test]
    fn test_cancel_if_same_type_exists_ignores_itself() {
        let incoming = login(QueuingBehaviour::CancelIfSameTypeExists);
        let active = [incoming.clone()];
        assert_eq!(evaluate(&incoming, &active), Verdict::Admit);
    }

    #[test]
    fn test_cancel_existing_of_same_type_evicts_all_of_kind() {
        let a = feed("1");
        let b = feed("2");
        let other = login(QueuingBehaviour::Plain);
        let active = [a.clone(), other, b.clone()];
        let incoming = feed("3").behaviour(QueuingBehaviour::CancelExistingOfSameType);
        assert_eq!(
            evaluate(&incoming, &active),
            Verdict::EvictThenAdmit(vec![a.id(), b.id()])
        );
    }

    #[test]
    fn test_cancel_existing_of_same_type_without_match_admits() {
        let active = [login(QueuingBehaviour::Plain)];
        let incoming = feed("1").behaviour(QueuingBehaviour::CancelExistingOfSameType);
        assert_eq!(evaluate(&incoming, &active), Verdict::Admit);
    }

    #[test]
    fn test_cancel_existing_equal_only_evicts_equal() {
        let same = feed("1");
        let different_page = feed("2");
        let active = [same.clone(), different_page];
        let incoming = feed("1").behaviour(QueuingBehaviour::CancelExistingEqual);
        assert_eq!(
            evaluate(&incoming, &active),
            Verdict::EvictThenAdmit(vec![same.id()])
        );
    }

    #[test]
    fn test_cancel_existing_equal_excludes_itself() {
        let incoming = feed("1").behaviour(QueuingBehaviour::CancelExistingEqual);
        let active = [incoming.clone()];
        assert_eq!(evaluate(&incoming, &active), Verdict::Admit);
    }

    #[test]
    fn test_verdict_is_admitted() {
        assert!(Verdict::Admit.is_admitted());
        assert!(Verdict::EvictThenAdmit(vec![]).is_admitted());
        assert!(!Verdict::Reject.is_admitted());
    }
}
