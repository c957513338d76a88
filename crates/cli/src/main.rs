//! Command-line front end for listing risk scoring and tax estimates.
//!
//! Usage:
//!     landrisk score --input listings.json --method critic
//!     landrisk summary --input listings.json --min-listings 3
//!     landrisk explain --input listings.json --row 12
//!     landrisk tax --area 80 --gov-price 190 --transfer-price 8000
//!     landrisk tax --input listings.json --row 12 --relief exempt_within_quota

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use landrisk_explain::{explain_score, summarize_by_district, summarize_streets};
use landrisk_model::{
    FraudScale, Listing, ReliefType, RiskComponents, RiskConfig, ScoredListing, WeightMethod,
};
use landrisk_score::{RiskEngine, ScoredDataset, ScoringContext};
use landrisk_source::{JsonRowsSource, ListingSource};
use landrisk_tax::{
    estimate_transaction, TaxInputs, DEFAULT_QUOTA_M2, DEFAULT_REGISTRATION_RATE,
    DEFAULT_TRANSFER_RATE,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "landrisk")]
#[command(about = "Score listing risk and estimate land transaction taxes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatasetArgs {
    /// JSON file with an array of listing rows
    #[arg(short, long)]
    input: PathBuf,

    /// JSON scoring config (column names, method, cap, weights)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Weighting method (critic, equal)
    #[arg(long)]
    method: Option<WeightMethod>,

    /// Listing gap at which the price component saturates
    #[arg(long)]
    cap: Option<f64>,

    /// Fraud probability scale (auto, unit, percent)
    #[arg(long)]
    fraud_scale: Option<FraudScale>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every listing in a dataset
    Score {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Aggregate scored listings by district and street
    Summary {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Minimum listings for a street to be reported
        #[arg(long, default_value = "3")]
        min_listings: usize,

        /// Number of streets to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Break down one listing's score
    Explain {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Zero-based row index
        #[arg(short, long)]
        row: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Estimate registration fee, transfer tax and land-use tax
    Tax(TaxArgs),
}

#[derive(Args)]
struct TaxArgs {
    /// Prefill area and prices from a row of this dataset
    #[arg(short, long, requires = "row")]
    input: Option<PathBuf>,

    /// JSON scoring config, for its column names
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zero-based row index in --input
    #[arg(short, long, requires = "input")]
    row: Option<usize>,

    /// Land area (m²) [default: the row's area, else 80]
    #[arg(long)]
    area: Option<f64>,

    /// Government land price (million VND/m²) [default: the row's, else 190]
    #[arg(long)]
    gov_price: Option<f64>,

    /// Total transfer price (million VND) [default: the row's, else 8000]
    #[arg(long)]
    transfer_price: Option<f64>,

    /// Residential land quota (m²)
    #[arg(long, default_value_t = DEFAULT_QUOTA_M2)]
    quota: f64,

    /// Land-use tax relief (none, exempt_within_quota,
    /// reduce50_within_quota, exempt_all, reduce50_all)
    #[arg(long, default_value = "none")]
    relief: ReliefType,

    #[arg(long, default_value_t = DEFAULT_REGISTRATION_RATE)]
    registration_rate: f64,

    #[arg(long, default_value_t = DEFAULT_TRANSFER_RATE)]
    transfer_rate: f64,

    /// Registration fee is exempt
    #[arg(long)]
    exempt_registration: bool,

    /// Transfer income tax is exempt
    #[arg(long)]
    exempt_transfer: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,
}

impl TaxArgs {
    /// Explicit flags win over values prefilled from `listing`.
    fn inputs(&self, listing: Option<&Listing>) -> TaxInputs {
        let base = listing.map(TaxInputs::from_listing).unwrap_or_default();
        TaxInputs {
            area_m2: self.area.unwrap_or(base.area_m2),
            gov_price_per_m2: self.gov_price.unwrap_or(base.gov_price_per_m2),
            transfer_price: self.transfer_price.unwrap_or(base.transfer_price),
            quota_m2: self.quota,
            registration_rate: self.registration_rate,
            transfer_rate: self.transfer_rate,
            exempt_registration: self.exempt_registration,
            exempt_transfer: self.exempt_transfer,
            land_use_relief: self.relief,
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("landrisk=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score { dataset, format } => {
            let scored = score_dataset(&dataset)?;
            run_score(&scored, &format)?;
        }
        Commands::Summary {
            dataset,
            min_listings,
            top,
            format,
        } => {
            let scored = score_dataset(&dataset)?;
            run_summary(&scored, min_listings, top, &format)?;
        }
        Commands::Explain {
            dataset,
            row,
            format,
        } => {
            let scored = score_dataset(&dataset)?;
            run_explain(&scored, row, &format)?;
        }
        Commands::Tax(args) => {
            let listing = load_listing(&args)?;
            run_tax(&args.inputs(listing.as_ref()), &args.format)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RiskConfig> {
    let Some(path) = path else {
        return Ok(RiskConfig::default());
    };
    tracing::debug!(path = %path.display(), "Loading config");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn score_dataset(args: &DatasetArgs) -> Result<ScoredDataset> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(method) = args.method {
        config = config.with_method(method);
    }
    if let Some(cap) = args.cap {
        config = config.with_cap_ratio(cap);
    }
    if let Some(fraud_scale) = args.fraud_scale {
        config = config.with_fraud_scale(fraud_scale);
    }

    let source = JsonRowsSource::new(&args.input, config.columns.clone());
    let listings = source
        .load()
        .with_context(|| format!("Loading listings from {} source", source.name()))?;
    tracing::info!(rows = listings.len(), input = %source.path().display(), "Loaded dataset");

    let engine = RiskEngine::new(config)?;
    Ok(engine.score_dataset(&listings))
}

fn load_listing(args: &TaxArgs) -> Result<Option<Listing>> {
    let (Some(input), Some(row)) = (&args.input, args.row) else {
        return Ok(None);
    };
    let config = load_config(args.config.as_deref())?;
    let source = JsonRowsSource::new(input, config.columns);
    let mut listings = source
        .load()
        .with_context(|| format!("Loading listings from {} source", source.name()))?;
    if row >= listings.len() {
        bail!("Row {} out of range ({} rows)", row, listings.len());
    }

    tracing::info!(row, input = %source.path().display(), "Prefilling tax inputs from listing");
    Ok(Some(listings.swap_remove(row)))
}

#[derive(Serialize)]
struct ScoreReport<'a> {
    version: String,
    context: &'a ScoringContext,
    rows: &'a [ScoredListing],
}

fn run_score(scored: &ScoredDataset, format: &str) -> Result<()> {
    if format == "json" {
        let report = ScoreReport {
            version: scored.version.to_string(),
            context: &scored.context,
            rows: &scored.rows,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_context(&scored.context);
    println!("---");
    for (i, row) in scored.rows.iter().enumerate() {
        println!(
            "{:>4}. {:<40} Risk Score: {:.3} ({})",
            i,
            location(row),
            row.risk_score,
            row.risk_level
        );
        println!("      {}", format_components(&row.components));
    }
    println!("---");
    println!("Total: {} listings", scored.rows.len());

    Ok(())
}

fn run_summary(scored: &ScoredDataset, min_listings: usize, top: usize, format: &str) -> Result<()> {
    let districts = summarize_by_district(&scored.rows);
    let mut streets = summarize_streets(&scored.rows, min_listings);
    streets.truncate(top);

    if format == "json" {
        let report = serde_json::json!({
            "districts": districts,
            "top_streets": streets,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("By district:");
    for d in &districts {
        println!(
            "  {:<20} listings: {:>5} | median gap: {} | mean risk: {}",
            d.district,
            d.stats.listings,
            format_opt(d.stats.median_price_gap),
            format_opt(d.stats.mean_risk)
        );
    }

    println!("\nTop streets by mean risk (min {} listings):", min_listings);
    for (i, s) in streets.iter().enumerate() {
        println!(
            "  {}. {} / {} / {} | listings: {} | median gap: {} | mean risk: {}",
            i + 1,
            s.district,
            s.ward,
            s.street,
            s.stats.listings,
            format_opt(s.stats.median_price_gap),
            format_opt(s.stats.mean_risk)
        );
    }

    Ok(())
}

fn run_explain(scored: &ScoredDataset, row: usize, format: &str) -> Result<()> {
    let Some(listing) = scored.rows.get(row) else {
        bail!("Row {} out of range ({} rows)", row, scored.rows.len());
    };
    let explanation = explain_score(listing, &scored.context);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    println!("Row {}: {}", row, location(listing));
    println!("{}", explanation.summary);
    match &explanation.thresholds {
        Some(t) => println!("Thresholds: Q33 = {:.3}, Q67 = {:.3}", t.q33, t.q67),
        None => println!("Thresholds: not available"),
    }
    println!("---");
    for c in &explanation.contributions {
        let value = match c.value {
            Some(v) => format!("{:.3}", v),
            None => format!("unknown (read as {:.1})", c.value_used),
        };
        println!(
            "  {:<20} value: {:<24} weight: {:.3}  contribution: {:.3}",
            c.label, value, c.weight, c.contribution
        );
    }
    println!(
        "Legal cue ({}): {:?} ({})",
        explanation.legal_cue.table,
        explanation.legal_cue.cue,
        explanation.legal_cue.rule.unwrap_or("no cue")
    );
    println!(
        "Planning cue ({}): {:?} ({})",
        explanation.planning_cue.table,
        explanation.planning_cue.cue,
        explanation.planning_cue.rule.unwrap_or("no cue")
    );
    println!("Listing gap: {}", format_opt(explanation.listing_gap));

    Ok(())
}

fn run_tax(inputs: &TaxInputs, format: &str) -> Result<()> {
    let estimate = estimate_transaction(inputs);

    if format == "json" {
        let report = serde_json::json!({
            "inputs": inputs,
            "estimate": estimate,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let land = &estimate.land_use_tax;
    println!("Registration fee:      {:>12.2} million VND", estimate.registration_fee);
    println!("Transfer income tax:   {:>12.2} million VND", estimate.transfer_tax);
    println!(
        "Land-use tax (annual): {:>12.2} million VND ({})",
        land.total_after_relief,
        land.relief.label()
    );
    println!("---");
    println!("{:<24} {:>10} {:>14} {:>14}", "Bracket", "Area m²", "Before relief", "After relief");
    let (areas, before, after) = (&land.area_m2, &land.tax_before_relief, &land.tax_after_relief);
    let rows = [
        ("Within quota", areas.within_quota, before.within_quota, after.within_quota),
        ("Quota to 3x quota", areas.quota_to_triple, before.quota_to_triple, after.quota_to_triple),
        ("Over 3x quota", areas.over_triple, before.over_triple, after.over_triple),
    ];
    for (name, area, before, after) in rows {
        println!("{:<24} {:>10.1} {:>14.3} {:>14.3}", name, area, before, after);
    }
    println!(
        "{:<24} {:>10.1} {:>14.3} {:>14.3}",
        "Total",
        land.area_m2.total(),
        land.total_before_relief,
        land.total_after_relief
    );
    println!("---");
    println!("Total (first year):    {:>12.2} million VND", estimate.total_first_year);

    Ok(())
}

fn print_context(context: &ScoringContext) {
    println!("Weights ({}):", context.weighting());
    for (component, weight) in context.weights().iter() {
        println!("  {:<8} {:.4}  {}", component.column(), weight, component.label());
    }
    match context.thresholds() {
        Some(t) => println!(
            "Thresholds: Q33 = {:.3}, Q67 = {:.3} over {} rows",
            t.q33,
            t.q67,
            context.rows()
        ),
        None => println!("Thresholds: not available over {} rows", context.rows()),
    }
}

fn location(row: &ScoredListing) -> String {
    let listing = &row.listing;
    let parts: Vec<&str> = [
        listing.district.as_deref(),
        listing.ward.as_deref(),
        listing.street.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
        "(no address)".to_string()
    } else {
        parts.join(" / ")
    }
}

fn format_components(components: &RiskComponents) -> String {
    let cell = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "?".to_string());
    format!(
        "S_legal={} S_fake={} S_price={} S_plan={} gap={}",
        cell(components.legal),
        cell(components.fake),
        cell(components.price),
        cell(components.plan),
        cell(components.listing_gap)
    )
}

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "n/a".to_string())
}
