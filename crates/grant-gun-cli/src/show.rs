use anstyle::{AnsiColor, Color, Effects, Style};
use grant_gun::approval::{ApprovalSession, SkipReason, Verdict, total_transfer_cents};
use grant_gun::links::{LinkOutcome, LinkReport};
use grant_gun::reconcile::Candidate;
use grant_gun::transfer::{WeightedGrantUnit, format_cents};
use std::io::{IsTerminal as _, Result, Write};

/// Terminal styles, or nothing at all when output is not a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn detect() -> Self {
        Palette {
            enabled: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn plain() -> Self {
        Palette { enabled: false }
    }

    fn style(&self, style: Style) -> Style {
        if self.enabled { style } else { Style::new() }
    }

    fn color(&self, color: AnsiColor) -> Style {
        self.style(Style::new().fg_color(Some(Color::Ansi(color))))
    }

    pub fn heading(&self) -> Style {
        self.color(AnsiColor::Cyan)
    }

    pub fn info(&self) -> Style {
        self.color(AnsiColor::Blue)
    }

    pub fn progress(&self) -> Style {
        self.color(AnsiColor::Yellow)
    }

    pub fn success(&self) -> Style {
        self.color(AnsiColor::Green)
    }

    pub fn failure(&self) -> Style {
        self.color(AnsiColor::Red)
    }

    pub fn muted(&self) -> Style {
        self.style(Style::new().effects(Effects::DIMMED))
    }

    pub fn bold(&self) -> Style {
        self.style(Style::new().bold())
    }
}

/// What is being paid out, in the words the operator sees.
#[derive(Debug, Clone, Copy)]
pub struct Wording {
    pub noun: &'static str,
    pub plural: &'static str,
    pub weighted_grant: WeightedGrantUnit,
}

fn dollars(cents: u64) -> String {
    format!("${}", format_cents(cents))
}

fn skip_text(reason: SkipReason) -> String {
    match reason {
        SkipReason::OverDisbursed(cents) => format!("Over-disbursed by {}", dollars(cents)),
        SkipReason::FullyDisbursed => "Already fully disbursed".to_owned(),
        SkipReason::MissingBudgetUrl => "Missing HCB URL".to_owned(),
        SkipReason::MissingEventId => "Missing HCB Event ID".to_owned(),
    }
}

pub fn candidate(
    out: &mut impl Write,
    palette: &Palette,
    wording: &Wording,
    candidate: &Candidate,
    position: usize,
    total: usize,
) -> Result<()> {
    let heading = palette.heading();
    let bold = palette.bold();
    let decision = &candidate.decision;

    writeln!(out)?;
    writeln!(
        out,
        "{heading}[{}/{total}] {}{heading:#}",
        position + 1,
        candidate.name()
    )?;
    writeln!(
        out,
        "   HCB URL: {}",
        candidate.record.budget_url.as_deref().unwrap_or("Not found")
    )?;
    writeln!(
        out,
        "   HCB Event ID: {}",
        candidate.event_id().unwrap_or("Unknown")
    )?;
    writeln!(
        out,
        "   Target Amount: {} ({} weighted grants)",
        dollars(decision.target_amount_cents),
        wording.weighted_grant.units_for(decision.target_amount_cents)
    )?;
    writeln!(
        out,
        "   Total Disbursements from HQ: {} ({} disbursements)",
        dollars(candidate.summary.total_amount_cents),
        candidate.summary.disbursement_count
    )?;
    writeln!(
        out,
        "   {bold}Transfer Amount: {}{bold:#}",
        dollars(decision.transfer_amount_cents)
    )?;

    if let Some(error) = &candidate.error {
        let failure = palette.failure();
        writeln!(out, "   {failure}Error: {error}{failure:#}")?;
    }
    if decision.transfer_amount_cents == 0 {
        let warning = palette.progress();
        let detail = match decision.over_disbursed_cents {
            0 => String::new(),
            over => format!(" (over-disbursed by {})", dollars(over)),
        };
        writeln!(out, "   {warning}⚠️  No transfer needed{detail}{warning:#}")?;
    }
    Ok(())
}

pub fn help(out: &mut impl Write, palette: &Palette, wording: &Wording) -> Result<()> {
    let info = palette.info();
    let noun = wording.noun;
    let plural = wording.plural;
    writeln!(out, "\n{info}Available commands:{info:#}")?;
    writeln!(out, "  y, yes     - Approve this {noun} and continue")?;
    writeln!(out, "  n, no      - Reject this {noun} and continue")?;
    writeln!(out, "  a, all     - Approve this {noun} and all remaining {plural}")?;
    writeln!(out, "  q, quit    - Reject this {noun} and all remaining {plural}")?;
    writeln!(out, "  ?, help    - Show this help message")?;
    Ok(())
}

pub fn decided(
    out: &mut impl Write,
    palette: &Palette,
    candidate: &Candidate,
    verdict: Verdict,
) -> Result<()> {
    let name = candidate.name();
    match verdict {
        Verdict::Approved => {
            let success = palette.success();
            match candidate.decision.transfer_amount_cents {
                0 => writeln!(out, "{success}✅ Approved: No transfer needed for {name}{success:#}"),
                cents => writeln!(
                    out,
                    "{success}✅ Approved: Will transfer {} to {name}{success:#}",
                    dollars(cents)
                ),
            }
        }
        Verdict::Rejected => {
            let failure = palette.failure();
            writeln!(out, "{failure}❌ Rejected: {name}{failure:#}")
        }
    }
}

pub fn skipped(
    out: &mut impl Write,
    palette: &Palette,
    candidate: &Candidate,
    position: usize,
    total: usize,
    reason: SkipReason,
) -> Result<()> {
    let warning = palette.progress();
    writeln!(
        out,
        "{warning}⏭️  Skipping [{}/{total}] {}: {}{warning:#}",
        position + 1,
        candidate.name(),
        skip_text(reason)
    )
}

pub fn summary(
    out: &mut impl Write,
    palette: &Palette,
    wording: &Wording,
    session: &ApprovalSession<Candidate>,
) -> Result<()> {
    let info = palette.info();
    let success = palette.success();
    let failure = palette.failure();
    let bold = palette.bold();

    writeln!(out, "\n{info}📊 Summary:{info:#}")?;
    writeln!(
        out,
        "{success}✅ Approved: {} {}{success:#}",
        session.approved_count(),
        wording.plural
    )?;
    writeln!(
        out,
        "{failure}❌ Rejected: {} {}{failure:#}",
        session.rejected_count(),
        wording.plural
    )?;

    let total = total_transfer_cents(session.approved());
    if total > 0 {
        writeln!(out, "{bold}💰 Total transfer amount: {}{bold:#}", dollars(total))?;
    }
    Ok(())
}

/// One line per payment page, as it is being opened.
pub fn link_report(out: &mut impl Write, palette: &Palette, report: &LinkReport<'_>) -> Result<()> {
    let name = report.candidate.name();
    match &report.outcome {
        LinkOutcome::Opened(url) => {
            let info = palette.info();
            let success = palette.success();
            writeln!(out, "{info}   🌐 Opening disbursement tab: {url}{info:#}")?;
            writeln!(out, "{success}   ✅ Opened disbursement page for {name}{success:#}")
        }
        LinkOutcome::Failed { url, error } => {
            let failure = palette.failure();
            let info = palette.info();
            writeln!(out, "{failure}   ❌ Failed to open browser: {error}{failure:#}")?;
            writeln!(out, "{info}   Please manually visit: {url}{info:#}")
        }
        LinkOutcome::Skipped(reason) => {
            let warning = palette.progress();
            writeln!(out, "{warning}   ⚠️  Skipping {name}: {}{warning:#}", skip_text(*reason))
        }
    }
}

/// Final status of every approved candidate.
pub fn transfer_status(
    out: &mut impl Write,
    palette: &Palette,
    reports: &[LinkReport<'_>],
) -> Result<()> {
    let info = palette.info();
    writeln!(out, "\n{info}📋 Transfer Summary:{info:#}")?;

    for report in reports {
        let name = report.candidate.name();
        let amount = dollars(report.candidate.decision.transfer_amount_cents);
        match &report.outcome {
            LinkOutcome::Opened(_) => writeln!(out, "✅ {name}: {amount} transfer page opened")?,
            LinkOutcome::Failed { url, .. } => {
                writeln!(out, "❌ {name}: {amount} open manually: {url}")?
            }
            LinkOutcome::Skipped(SkipReason::FullyDisbursed) => {
                writeln!(out, "⚪ {name}: fully disbursed")?
            }
            LinkOutcome::Skipped(SkipReason::OverDisbursed(cents)) => {
                writeln!(out, "⚠️  {name}: over-disbursed by {}", dollars(*cents))?
            }
            LinkOutcome::Skipped(SkipReason::MissingBudgetUrl) => {
                writeln!(out, "❌ {name}: {amount} no HCB URL")?
            }
            LinkOutcome::Skipped(SkipReason::MissingEventId) => {
                writeln!(out, "❌ {name}: {amount} no event")?
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grant_gun::approval::Command;
    use grant_gun::links::{PaymentLinkOpener, PaymentLinks, open_payment_links};
    use grant_gun::reconcile::{BudgetRecord, DisbursementSummary};
    use grant_gun::transfer::compute_transfer;
    use grant_gun::OrgIdentity;
    use reqwest::Url;

    fn grants() -> Wording {
        Wording {
            noun: "grant",
            plural: "grants",
            weighted_grant: WeightedGrantUnit::default(),
        }
    }

    fn candidate_with(name: &str, url: Option<&str>, target: u64, disbursed: u64) -> Candidate {
        Candidate {
            org: url.and_then(|url| OrgIdentity::from_budget_url(url, "ysws-budget-")),
            record: BudgetRecord {
                id: format!("rec-{name}"),
                name: name.to_owned(),
                target_amount_cents: target,
                budget_url: url.map(ToOwned::to_owned),
            },
            summary: DisbursementSummary {
                total_amount_cents: disbursed,
                disbursement_count: usize::from(disbursed > 0),
                disbursements: Vec::new(),
            },
            decision: compute_transfer(target, disbursed),
            error: None,
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn candidate_card() {
        let outstanding = candidate_with(
            "Dhamari",
            Some("https://hcb.hackclub.com/ysws-budget-dhamari"),
            25500,
            8500,
        );
        insta::assert_snapshot!(render(|out| candidate(out, &Palette::plain(), &grants(), &outstanding, 0, 2)), @r"
        [1/2] Dhamari
           HCB URL: https://hcb.hackclub.com/ysws-budget-dhamari
           HCB Event ID: ysws-budget-dhamari
           Target Amount: $255.00 (3.0 weighted grants)
           Total Disbursements from HQ: $85.00 (1 disbursements)
           Transfer Amount: $170.00
        ");

        let mut over = candidate_with("Sprig", None, 8500, 10000);
        over.error = Some("request failed".to_owned());
        insta::assert_snapshot!(render(|out| candidate(out, &Palette::plain(), &grants(), &over, 1, 2)), @r"
        [2/2] Sprig
           HCB URL: Not found
           HCB Event ID: Unknown
           Target Amount: $85.00 (1.0 weighted grants)
           Total Disbursements from HQ: $100.00 (1 disbursements)
           Transfer Amount: $0.00
           Error: request failed
           ⚠️  No transfer needed (over-disbursed by $15.00)
        ");
    }

    #[test]
    fn help_lists_commands() {
        insta::assert_snapshot!(render(|out| help(out, &Palette::plain(), &grants())), @r"
        Available commands:
          y, yes     - Approve this grant and continue
          n, no      - Reject this grant and continue
          a, all     - Approve this grant and all remaining grants
          q, quit    - Reject this grant and all remaining grants
          ?, help    - Show this help message
        ");
    }

    struct FailOn(&'static str);

    impl PaymentLinkOpener for FailOn {
        fn open(&mut self, url: &Url) -> anyhow::Result<()> {
            if url.as_str().contains(self.0) {
                anyhow::bail!("no display");
            }
            Ok(())
        }
    }

    #[test]
    fn run_summary_and_transfer_status() {
        let mut session = ApprovalSession::new(vec![
            candidate_with("A", Some("https://hcb.hackclub.com/ysws-budget-a"), 17000, 0),
            candidate_with("B", Some("https://hcb.hackclub.com/ysws-budget-b"), 8500, 8500),
            candidate_with("C", Some("https://hcb.hackclub.com/ysws-budget-c"), 8500, 9000),
            candidate_with("D", Some("https://hcb.hackclub.com/ysws-budget-d"), 4250, 0),
            candidate_with("E", None, 8500, 0),
        ]);
        session.apply(Command::RejectOne);
        session.apply(Command::ApproveRest);

        let palette = Palette::plain();
        insta::assert_snapshot!(render(|out| summary(out, &palette, &grants(), &session)), @r"
        📊 Summary:
        ✅ Approved: 4 grants
        ❌ Rejected: 1 grants
        💰 Total transfer amount: $127.50
        ");

        let links = PaymentLinks {
            base: Url::parse("https://hcb.hackclub.com/disbursements/new").unwrap(),
            source_event_id: "hq".to_owned(),
            message_prefix: String::new(),
            weighted_grant: WeightedGrantUnit::default(),
        };
        let reports = open_payment_links(session.approved(), &links, &mut FailOn("budget-d"));
        insta::assert_snapshot!(render(|out| {
            for report in &reports {
                link_report(out, &palette, report)?;
            }
            transfer_status(out, &palette, &reports)
        }), @r"
           ⚠️  Skipping B: Already fully disbursed
           ⚠️  Skipping C: Over-disbursed by $5.00
           ❌ Failed to open browser: no display
           Please manually visit: https://hcb.hackclub.com/disbursements/new?source_event_id=hq&event_id=ysws-budget-d&amount=4250&message=for+0.5+weighted+grants
           ⚠️  Skipping E: Missing HCB URL

        📋 Transfer Summary:
        ⚪ B: fully disbursed
        ⚠️  C: over-disbursed by $5.00
        ❌ D: $42.50 open manually: https://hcb.hackclub.com/disbursements/new?source_event_id=hq&event_id=ysws-budget-d&amount=4250&message=for+0.5+weighted+grants
        ❌ E: $85.00 no HCB URL
        ");
    }
}
