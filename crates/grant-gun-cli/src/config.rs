use anyhow::{Context, Result};
use grant_gun::links::PaymentLinks;
use grant_gun::reconcile::{HqIdentity, ReconcileConfig};
use grant_gun::transaction::Identifier;
use grant_gun::transfer::{DEFAULT_WEIGHTED_GRANT_CENTS, WeightedGrantUnit};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigHq {
    pub event_id: String,
    pub slug: String,
    pub memo_marker: String,
    pub opt_out_label: String,
}

impl Default for ConfigHq {
    fn default() -> Self {
        ConfigHq {
            event_id: "183".to_owned(),
            slug: "hq".to_owned(),
            memo_marker: "HQ".to_owned(),
            opt_out_label: "no-grant-calc".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigHcb {
    pub api_url: String,
    pub disbursement_url: String,
    pub source_event_id: String,
    pub budget_slug_prefix: String,
    pub batch_size: usize,
}

impl Default for ConfigHcb {
    fn default() -> Self {
        ConfigHcb {
            api_url: "https://hcb.hackclub.com/api/v4".to_owned(),
            disbursement_url: "https://hcb.hackclub.com/disbursements/new".to_owned(),
            source_event_id: "hq".to_owned(),
            budget_slug_prefix: "ysws-budget-".to_owned(),
            batch_size: grant_gun::pager::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigAirtable {
    pub api_url: String,
    pub base_id: String,
    pub grants_table: String,
    pub programs_table: String,
}

impl Default for ConfigAirtable {
    fn default() -> Self {
        ConfigAirtable {
            api_url: "https://api.airtable.com/v0".to_owned(),
            base_id: "app3A5kJwYqxMLOgh".to_owned(),
            grants_table: "tblRf1BQs5H8298gW".to_owned(),
            programs_table: "tblrGi9RARJy1A0c5".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub hq: ConfigHq,
    pub hcb: ConfigHcb,
    pub airtable: ConfigAirtable,
    pub weighted_grant_cents: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hq: ConfigHq::default(),
            hcb: ConfigHcb::default(),
            airtable: ConfigAirtable::default(),
            weighted_grant_cents: DEFAULT_WEIGHTED_GRANT_CENTS,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn find_and_load() -> Result<Option<Self>> {
        let config_locations = [Path::new("grant-gun.toml"), Path::new(".grant-gun.toml")];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }

    /// The explicitly named file, else the first config file found, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::find_and_load()?.unwrap_or_default()),
        }
    }

    pub fn weighted_grant(&self) -> WeightedGrantUnit {
        WeightedGrantUnit::new(self.weighted_grant_cents)
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            hq: HqIdentity {
                event_id: Identifier::new(self.hq.event_id.as_str()),
                slug: self.hq.slug.clone(),
            },
            memo_marker: self.hq.memo_marker.clone(),
            opt_out_label: self.hq.opt_out_label.clone(),
            batch_size: self.hcb.batch_size.max(1),
            budget_slug_prefix: self.hcb.budget_slug_prefix.clone(),
            weighted_grant: self.weighted_grant(),
            ..ReconcileConfig::default()
        }
    }

    pub fn payment_links(&self, message_prefix: &str) -> Result<PaymentLinks> {
        let base = Url::parse(&self.hcb.disbursement_url).with_context(|| {
            format!("Invalid disbursement_url `{}`", self.hcb.disbursement_url)
        })?;
        Ok(PaymentLinks {
            base,
            source_event_id: self.hcb.source_event_id.clone(),
            message_prefix: message_prefix.to_owned(),
            weighted_grant: self.weighted_grant(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.weighted_grant_cents, 8500);
        assert_eq!(config.hq.event_id, "183");
        assert_eq!(config.hcb.batch_size, 1000);
        assert_eq!(config.airtable.base_id, "app3A5kJwYqxMLOgh");
    }

    #[test]
    fn partial_sections() {
        let config: Config = toml::from_str(
            r#"
weighted_grant_cents = 10000

[hq]
event_id = "42"

[hcb]
batch_size = 250
"#,
        )
        .unwrap();
        assert_eq!(config.hq.slug, "hq");
        assert_eq!(config.hcb.source_event_id, "hq");

        let reconcile = config.reconcile_config();
        assert_eq!(reconcile.hq.event_id, Identifier::new("42"));
        assert_eq!(reconcile.batch_size, 250);
        assert_eq!(reconcile.weighted_grant.cents(), 10000);
        assert_eq!(reconcile.transaction_type.as_deref(), Some("disbursement"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let error = toml::from_str::<Config>("[hcb]\nbatchsize = 5\n").unwrap_err();
        assert!(error.to_string().contains("unknown field `batchsize`"));
    }

    #[test]
    fn payment_links() {
        let links = Config::default().payment_links("Program payout ").unwrap();
        assert_eq!(links.message(17000), "Program payout for 2.0 weighted grants");
        assert_eq!(
            links.base.as_str(),
            "https://hcb.hackclub.com/disbursements/new"
        );

        let mut config = Config::default();
        config.hcb.disbursement_url = "not a url".to_owned();
        assert!(config.payment_links("").is_err());
    }
}
