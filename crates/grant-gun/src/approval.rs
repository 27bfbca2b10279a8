//! Walking the operator through the candidates, one decision at a time.

use crate::reconcile::Candidate;
use crate::transfer::TransferStatus;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ApproveOne,
    RejectOne,
    ApproveRest,
    RejectRest,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Please enter y, n, a, q, or ? for help")]
pub struct InvalidCommand;

impl FromStr for Command {
    type Err = InvalidCommand;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(Command::ApproveOne),
            "n" | "no" => Ok(Command::RejectOne),
            "a" | "all" => Ok(Command::ApproveRest),
            "q" | "quit" => Ok(Command::RejectRest),
            "?" | "help" => Ok(Command::Help),
            _ => Err(InvalidCommand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
}

/// The effect of one command on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Candidates in `range` received `verdict`.
    Decided { verdict: Verdict, range: Range<usize> },
    Help,
}

/// Partition of an ordered candidate list into approved and rejected, built one command at a
/// time. The session is finished once the cursor has passed the last candidate.
#[derive(Debug)]
pub struct ApprovalSession<T> {
    candidates: Vec<T>,
    cursor: usize,
    approved: Vec<usize>,
    rejected: Vec<usize>,
}

impl<T> ApprovalSession<T> {
    pub fn new(candidates: Vec<T>) -> Self {
        ApprovalSession {
            candidates,
            cursor: 0,
            approved: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.candidates.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.candidates.get(self.cursor)
    }

    pub fn candidate(&self, index: usize) -> &T {
        &self.candidates[index]
    }

    pub fn apply(&mut self, command: Command) -> Step {
        let (verdict, end) = match command {
            Command::Help => return Step::Help,
            Command::ApproveOne => (Verdict::Approved, self.cursor + 1),
            Command::RejectOne => (Verdict::Rejected, self.cursor + 1),
            Command::ApproveRest => (Verdict::Approved, self.candidates.len()),
            Command::RejectRest => (Verdict::Rejected, self.candidates.len()),
        };
        let range = self.cursor..end.min(self.candidates.len());
        let target = match verdict {
            Verdict::Approved => &mut self.approved,
            Verdict::Rejected => &mut self.rejected,
        };
        target.extend(range.clone());
        self.cursor = range.end;
        Step::Decided { verdict, range }
    }

    pub fn approved(&self) -> impl Iterator<Item = &T> {
        self.approved.iter().map(|&index| &self.candidates[index])
    }

    pub fn rejected(&self) -> impl Iterator<Item = &T> {
        self.rejected.iter().map(|&index| &self.candidates[index])
    }

    pub fn approved_count(&self) -> usize {
        self.approved.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Why a candidate cannot lead to a payment link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OverDisbursed(u64),
    FullyDisbursed,
    MissingBudgetUrl,
    MissingEventId,
}

pub fn skip_reason(candidate: &Candidate) -> Option<SkipReason> {
    match candidate.decision.status() {
        TransferStatus::OverDisbursed => {
            return Some(SkipReason::OverDisbursed(
                candidate.decision.over_disbursed_cents,
            ));
        }
        TransferStatus::FullyDisbursed => return Some(SkipReason::FullyDisbursed),
        TransferStatus::Outstanding => {}
    }
    if candidate.record.budget_url.is_none() {
        return Some(SkipReason::MissingBudgetUrl);
    }
    if candidate.event_id().is_none() {
        return Some(SkipReason::MissingEventId);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPolicy {
    /// Ask about every candidate, even those needing no transfer.
    PresentAll,
    /// Reject candidates that cannot produce a transfer without asking.
    SkipSettled,
}

/// The operator side of the review.
///
/// Only `ask` is required; the notifications exist so a front end can echo what happened.
pub trait OperatorPrompt {
    fn ask(&mut self, candidate: &Candidate, position: usize, total: usize)
    -> anyhow::Result<Command>;

    fn show_help(&mut self) {}

    fn decided(&mut self, _candidate: &Candidate, _verdict: Verdict) {}

    fn skipped(
        &mut self,
        _candidate: &Candidate,
        _position: usize,
        _total: usize,
        _reason: SkipReason,
    ) {
    }
}

/// Run the review until every candidate is approved or rejected.
pub fn review(
    candidates: Vec<Candidate>,
    prompt: &mut impl OperatorPrompt,
    policy: ReviewPolicy,
) -> anyhow::Result<ApprovalSession<Candidate>> {
    let mut session = ApprovalSession::new(candidates);
    let total = session.len();

    while let Some(candidate) = session.current() {
        let position = session.cursor();

        if policy == ReviewPolicy::SkipSettled
            && let Some(reason) = skip_reason(candidate)
        {
            prompt.skipped(candidate, position, total, reason);
            session.apply(Command::RejectOne);
            continue;
        }

        let command = prompt.ask(candidate, position, total)?;
        match session.apply(command) {
            Step::Help => prompt.show_help(),
            Step::Decided { verdict, range } => {
                for index in range {
                    prompt.decided(session.candidate(index), verdict);
                }
            }
        }
    }

    Ok(session)
}

/// Sum of the outstanding transfers of `candidates`.
pub fn total_transfer_cents<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> u64 {
    candidates
        .into_iter()
        .map(|candidate| candidate.decision.transfer_amount_cents)
        .fold(0, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{BudgetRecord, DisbursementSummary};
    use crate::org::OrgIdentity;
    use crate::transfer::compute_transfer;
    use std::collections::VecDeque;

    fn candidate(name: &str, target: u64, disbursed: u64) -> Candidate {
        let url = format!("https://hcb.hackclub.com/ysws-budget-{name}");
        Candidate {
            org: OrgIdentity::from_budget_url(&url, "ysws-budget-"),
            record: BudgetRecord {
                id: format!("rec-{name}"),
                name: name.to_owned(),
                target_amount_cents: target,
                budget_url: Some(url),
            },
            summary: DisbursementSummary::default(),
            decision: compute_transfer(target, disbursed),
            error: None,
        }
    }

    /// Replays scripted commands and records every notification.
    #[derive(Default)]
    struct Scripted {
        commands: VecDeque<Command>,
        log: Vec<String>,
    }

    impl Scripted {
        fn new(commands: impl IntoIterator<Item = Command>) -> Self {
            Scripted {
                commands: commands.into_iter().collect(),
                log: Vec::new(),
            }
        }
    }

    impl OperatorPrompt for Scripted {
        fn ask(
            &mut self,
            candidate: &Candidate,
            position: usize,
            total: usize,
        ) -> anyhow::Result<Command> {
            self.log.push(format!("ask [{}/{total}] {}", position + 1, candidate.name()));
            self.commands
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }

        fn show_help(&mut self) {
            self.log.push("help".to_owned());
        }

        fn decided(&mut self, candidate: &Candidate, verdict: Verdict) {
            self.log.push(format!("{verdict:?} {}", candidate.name()));
        }

        fn skipped(
            &mut self,
            candidate: &Candidate,
            position: usize,
            total: usize,
            reason: SkipReason,
        ) {
            self.log.push(format!(
                "skip [{}/{total}] {}: {reason:?}",
                position + 1,
                candidate.name()
            ));
        }
    }

    fn names<'a>(candidates: impl Iterator<Item = &'a Candidate>) -> Vec<&'a str> {
        candidates.map(Candidate::name).collect()
    }

    #[test]
    fn parse_commands() {
        assert_eq!(" Y ".parse(), Ok(Command::ApproveOne));
        assert_eq!("no".parse(), Ok(Command::RejectOne));
        assert_eq!("ALL".parse(), Ok(Command::ApproveRest));
        assert_eq!("q".parse(), Ok(Command::RejectRest));
        assert_eq!("?".parse(), Ok(Command::Help));
        assert_eq!("help".parse(), Ok(Command::Help));
        assert_eq!("maybe".parse::<Command>(), Err(InvalidCommand));
        assert_eq!("".parse::<Command>(), Err(InvalidCommand));
    }

    #[test]
    fn reject_one_then_approve_rest() {
        let mut session = ApprovalSession::new(vec!["c0", "c1", "c2"]);
        assert_eq!(
            session.apply(Command::RejectOne),
            Step::Decided {
                verdict: Verdict::Rejected,
                range: 0..1
            }
        );
        assert_eq!(
            session.apply(Command::ApproveRest),
            Step::Decided {
                verdict: Verdict::Approved,
                range: 1..3
            }
        );
        assert!(session.is_finished());
        assert_eq!(session.rejected().collect::<Vec<_>>(), [&"c0"]);
        assert_eq!(session.approved().collect::<Vec<_>>(), [&"c1", &"c2"]);
    }

    #[test]
    fn help_keeps_cursor() {
        let mut session = ApprovalSession::new(vec!["c0", "c1"]);
        session.apply(Command::ApproveOne);
        assert_eq!(session.apply(Command::Help), Step::Help);
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.current(), Some(&"c1"));
        session.apply(Command::RejectRest);
        assert!(session.is_finished());
        assert_eq!(session.approved_count(), 1);
        assert_eq!(session.rejected_count(), 1);
    }

    #[test]
    fn empty_session_is_finished() {
        let session = ApprovalSession::<()>::new(Vec::new());
        assert!(session.is_finished());
        assert!(session.is_empty());
    }

    #[test]
    fn review_presents_everything() {
        let candidates = vec![
            candidate("a", 17000, 8500),
            candidate("b", 8500, 8500),
            candidate("c", 8500, 0),
        ];
        let mut prompt = Scripted::new([Command::Help, Command::ApproveOne, Command::ApproveRest]);
        let session = review(candidates, &mut prompt, ReviewPolicy::PresentAll).unwrap();

        insta::assert_snapshot!(prompt.log.join("\n"), @r"
        ask [1/3] a
        help
        ask [1/3] a
        Approved a
        ask [2/3] b
        Approved b
        Approved c
        ");
        assert_eq!(names(session.approved()), ["a", "b", "c"]);
        assert_eq!(total_transfer_cents(session.approved()), 8500 + 8500);
    }

    #[test]
    fn review_skips_settled() {
        let mut unlinked = candidate("unlinked", 8500, 0);
        unlinked.record.budget_url = None;
        unlinked.org = None;
        let mut unresolved = candidate("unresolved", 8500, 0);
        unresolved.org = None;

        let candidates = vec![
            candidate("over", 8500, 10000),
            candidate("owed", 17000, 0),
            candidate("done", 8500, 8500),
            unlinked,
            unresolved,
            candidate("last", 100, 0),
        ];
        let mut prompt = Scripted::new([Command::RejectOne, Command::ApproveOne]);
        let session = review(candidates, &mut prompt, ReviewPolicy::SkipSettled).unwrap();

        insta::assert_snapshot!(prompt.log.join("\n"), @r"
        skip [1/6] over: OverDisbursed(1500)
        ask [2/6] owed
        Rejected owed
        skip [3/6] done: FullyDisbursed
        skip [4/6] unlinked: MissingBudgetUrl
        skip [5/6] unresolved: MissingEventId
        ask [6/6] last
        Approved last
        ");
        assert_eq!(names(session.approved()), ["last"]);
        assert_eq!(
            names(session.rejected()),
            ["over", "owed", "done", "unlinked", "unresolved"]
        );
    }

    #[test]
    fn review_propagates_prompt_failure() {
        let mut prompt = Scripted::default();
        let error = review(vec![candidate("a", 1, 0)], &mut prompt, ReviewPolicy::PresentAll)
            .unwrap_err();
        assert_eq!(error.to_string(), "script exhausted");
    }
}
