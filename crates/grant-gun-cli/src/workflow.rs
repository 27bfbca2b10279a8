use crate::airtable::{AirtableClient, RecordSchema, is_unknown_field_error, program_formula};
use crate::config::Config;
use crate::hcb::HcbClient;
use crate::opener::{BrowserOpener, open_or_print};
use crate::prompt::LinePrompt;
use crate::show::{self, Palette, Wording};
use anyhow::{Result, bail};
use grant_gun::approval::{OperatorPrompt, ReviewPolicy, review};
use grant_gun::links::{PaymentLinkOpener, open_payment_links};
use grant_gun::pager::TransactionSource;
use grant_gun::reconcile::{BudgetRecord, BudgetRecordSource, reconcile_all};
use grant_gun_auth::{AirtablePat, HcbOAuth, Token, validate_token};
use std::io::Write;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    /// One transfer per grant budget row.
    Grants,
    /// One payout per program, optionally narrowed by a search text.
    Programs { search: Option<String> },
}

impl Workflow {
    fn wording(&self, config: &Config) -> Wording {
        let (noun, plural) = match self {
            Workflow::Grants => ("grant", "grants"),
            Workflow::Programs { .. } => ("program", "programs"),
        };
        Wording {
            noun,
            plural,
            weighted_grant: config.weighted_grant(),
        }
    }

    fn message_prefix(&self) -> &'static str {
        match self {
            Workflow::Grants => "",
            Workflow::Programs { .. } => "Program payout ",
        }
    }

    fn policy(&self) -> ReviewPolicy {
        match self {
            Workflow::Grants => ReviewPolicy::PresentAll,
            Workflow::Programs { .. } => ReviewPolicy::SkipSettled,
        }
    }

    fn schema(&self, config: &Config) -> RecordSchema {
        match self {
            Workflow::Grants => RecordSchema::Grants,
            Workflow::Programs { .. } => RecordSchema::Programs {
                weighted_grant: config.weighted_grant(),
            },
        }
    }

    fn table<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            Workflow::Grants => &config.airtable.grants_table,
            Workflow::Programs { .. } => &config.airtable.programs_table,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Workflow::Grants => "Grant Gun",
            Workflow::Programs { .. } => "Program Payout",
        }
    }

    fn review_title(&self) -> &'static str {
        match self {
            Workflow::Grants => "📋 Grant Approval Process",
            Workflow::Programs { .. } => "💰 Program Payout Process",
        }
    }
}

pub struct Credentials {
    pub airtable: Token,
    pub hcb: Token,
}

async fn hcb_token(config: &Config, client: &reqwest::Client) -> Result<Token> {
    if let Some(token) = std::env::var("HCB_TOKEN").ok().filter(|token| !token.is_empty()) {
        let token = Token::bearer(token);
        if !validate_token(client, &config.hcb.api_url, &token).await {
            bail!("HCB_TOKEN was rejected by the HCB API");
        }
        return Ok(token);
    }

    let oauth = HcbOAuth::from_env(&config.hcb.api_url)?;
    println!("   Authorize grant-gun in your browser:");
    oauth.authenticate(client, open_or_print).await
}

/// Validate the Airtable token and obtain an HCB token, reporting each step.
pub async fn authenticate(
    config: &Config,
    client: &reqwest::Client,
    palette: &Palette,
) -> Result<Credentials> {
    let progress = palette.progress();
    let success = palette.success();

    println!("{progress}📋 Validating Airtable credentials...{progress:#}");
    let airtable = AirtablePat::from_env()?
        .authenticate(client, &config.airtable.api_url)
        .await?;
    println!("{success}✅ Airtable credentials validated{success:#}");

    println!("{progress}🏦 Authenticating with HCB...{progress:#}");
    let hcb = hcb_token(config, client).await?;
    println!("{success}✅ HCB authentication successful{success:#}");

    Ok(Credentials { airtable, hcb })
}

pub async fn check_auth(config: &Config, palette: &Palette) -> Result<()> {
    let info = palette.info();
    println!("{info}🔐 Testing authentication...{info:#}\n");
    let client = reqwest::Client::new();
    if let Err(error) = authenticate(config, &client, palette).await {
        let failure = palette.failure();
        println!("{failure}❌ Authentication failed: {error:#}{failure:#}");
        return Err(error);
    }
    Ok(())
}

/// Authenticate, then reconcile and review against the live services.
pub async fn run(workflow: &Workflow, config: &Config, palette: Palette) -> Result<()> {
    let info = palette.info();
    println!("{info}🚀 Starting {} workflow...{info:#}\n", workflow.title());

    let client = reqwest::Client::new();
    let credentials = authenticate(config, &client, &palette).await?;
    println!();

    let records = AirtableClient::new(
        client.clone(),
        &config.airtable.api_url,
        &config.airtable.base_id,
        workflow.table(config),
        credentials.airtable,
        workflow.schema(config),
        &config.hcb.budget_slug_prefix,
    );
    let transactions = HcbClient::new(client, &config.hcb.api_url, credentials.hcb);
    let mut prompt = LinePrompt::new(
        std::io::stdin().lock(),
        std::io::stdout(),
        palette,
        workflow.wording(config),
    );

    Runner {
        workflow,
        config,
        palette,
    }
    .process(
        &records,
        &transactions,
        &mut prompt,
        &mut BrowserOpener,
        &mut std::io::stdout(),
    )
    .await
}

pub struct Runner<'a> {
    pub workflow: &'a Workflow,
    pub config: &'a Config,
    pub palette: Palette,
}

impl Runner<'_> {
    async fn list_records(
        &self,
        source: &impl BudgetRecordSource,
        out: &mut impl Write,
    ) -> Result<Vec<BudgetRecord>> {
        let Workflow::Programs { search } = self.workflow else {
            return source.list_eligible_records(None).await;
        };

        let info = self.palette.info();
        if let Some(search) = search {
            writeln!(out, "{info}🔍 Filtering for program matching: \"{search}\"{info:#}")?;
        }

        let formula = program_formula(search.as_deref(), true);
        match source.list_eligible_records(Some(&formula)).await {
            Err(error) if is_unknown_field_error(&error) => {
                warn!("Listing programs with the payout switch failed: {error:#}");
                let warning = self.palette.progress();
                writeln!(
                    out,
                    "{warning}⚠️  \"Enable payouts\" field not found. Falling back to weighted total filter.{warning:#}"
                )?;
                writeln!(
                    out,
                    "{warning}   Add an \"Enable payouts\" checkbox field to the Programs table for better control.{warning:#}"
                )?;
                let fallback = program_formula(search.as_deref(), false);
                source.list_eligible_records(Some(&fallback)).await
            }
            listed => listed,
        }
    }

    /// List, reconcile, review, then open the payment pages of the approved transfers.
    pub async fn process(
        &self,
        records: &impl BudgetRecordSource,
        transactions: &impl TransactionSource,
        prompt: &mut impl OperatorPrompt,
        opener: &mut impl PaymentLinkOpener,
        out: &mut impl Write,
    ) -> Result<()> {
        let wording = self.workflow.wording(self.config);
        let plural = wording.plural;
        let progress = self.palette.progress();
        let success = self.palette.success();
        let info = self.palette.info();

        writeln!(out, "{progress}📊 Fetching {plural} from Airtable...{progress:#}")?;
        let records = self.list_records(records, out).await?;
        writeln!(
            out,
            "{success}✅ Found {} eligible {plural}{success:#}\n",
            records.len()
        )?;
        if records.is_empty() {
            writeln!(out, "{progress}No {plural} found matching criteria.{progress:#}")?;
            return Ok(());
        }

        writeln!(out, "{progress}💰 Querying HCB transfer history...{progress:#}")?;
        let candidates =
            reconcile_all(transactions, &self.config.reconcile_config(), records).await;
        writeln!(out, "{success}✅ Transfer history query complete{success:#}\n")?;

        let muted = self.palette.muted();
        writeln!(out, "{info}{}{info:#}", self.workflow.review_title())?;
        writeln!(
            out,
            "{muted}Review each {} for approval. Use ? for help.{muted:#}",
            wording.noun
        )?;
        out.flush()?;

        let session = review(candidates, prompt, self.workflow.policy())?;
        show::summary(out, &self.palette, &wording, &session)?;

        if session.approved_count() == 0 {
            return Ok(());
        }

        writeln!(out, "\n{info}🌐 Opening disbursement pages...{info:#}")?;
        let links = self.config.payment_links(self.workflow.message_prefix())?;
        let reports = open_payment_links(session.approved(), &links, opener);
        for report in &reports {
            show::link_report(out, &self.palette, report)?;
        }
        show::transfer_status(out, &self.palette, &reports)?;
        Ok(())
    }
}
