use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookwatch_shared::{
    DetailId, HttpListingApi, InterestControl, MutationOutcome, ResultsView, Tracker,
    TrackerConfig, TrackerError, ViewFilters,
};

#[derive(Debug, Parser)]
#[command(name = "bookwatch", version, about = "Track scraped book listings")]
struct Cli {
    /// Backend base URL, overrides BOOKWATCH_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Encoded results query, e.g. "group_by=Isbn&max_price=20"
    #[arg(long, short, global = true, default_value = "")]
    query: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the filtered results
    List(FilterArgs),
    /// Toggle the star on a listing
    Star { detail_id: String },
    /// Toggle the dismiss control on a listing
    Dismiss { detail_id: String },
    /// Toggle the contacted flag on a listing
    Contact { detail_id: String },
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long, conflicts_with = "hide_not_interested")]
    show_interested: bool,
    #[arg(long)]
    hide_not_interested: bool,
    #[arg(long)]
    show_contacted: bool,
}

impl FilterArgs {
    fn filters(&self) -> ViewFilters {
        ViewFilters::new()
            .with_show_interested(self.show_interested)
            .with_hide_not_interested(self.hide_not_interested)
            .with_show_contacted(self.show_contacted)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = TrackerConfig::from_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = url;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.kind().code(), error = %e, "bookwatch failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &TrackerConfig) -> Result<(), TrackerError> {
    let api = HttpListingApi::new(config)?;
    info!(base = %api.base_url(), "using backend");
    let tracker = Tracker::new(Arc::new(api));

    tracker.load_results(&cli.query).await?;

    match cli.command {
        Command::List(args) => {
            let view = tracker.set_filters(args.filters()).await;
            print_view(&view);
        }
        Command::Star { detail_id } => {
            interest(&tracker, &detail_id, InterestControl::MarkInterested).await?;
        }
        Command::Dismiss { detail_id } => {
            interest(&tracker, &detail_id, InterestControl::MarkNotInterested).await?;
        }
        Command::Contact { detail_id } => {
            let id: DetailId = detail_id.parse()?;
            let current = tracker.observed_contact(id).await;
            let outcome = tracker.handle_contact(&detail_id, current).await;
            report(&detail_id, outcome)?;
        }
    }

    println!("interested: {}", tracker.interested_count().await);
    Ok(())
}

async fn interest(
    tracker: &Tracker<HttpListingApi>,
    raw_id: &str,
    control: InterestControl,
) -> Result<(), TrackerError> {
    let id: DetailId = raw_id.parse()?;
    let current = tracker.observed_interest(id).await;
    let outcome = tracker.handle_interest(raw_id, current, control).await;
    report(raw_id, outcome)
}

fn report<V: Copy + std::fmt::Display>(
    raw_id: &str,
    outcome: MutationOutcome<V>,
) -> Result<(), TrackerError> {
    match outcome {
        MutationOutcome::Committed { value, patched, .. } => {
            println!("{raw_id}: {value} ({patched} cached rows updated)");
            Ok(())
        }
        MutationOutcome::RolledBack { restored, error, .. } => {
            println!("{raw_id}: kept {restored}");
            Err(error.into())
        }
        MutationOutcome::InFlight => {
            println!("{raw_id}: busy");
            Ok(())
        }
        MutationOutcome::Refused(e) => Err(e.into()),
    }
}

fn print_view(view: &ResultsView) {
    for group in &view.groups {
        if let Some(key) = group.key() {
            println!("== {key} ({})", group.len());
        }
        for listing in &group.results {
            let marks = listing.interest.display();
            println!(
                "  [{}{}{}] {:>6}  {}  {}",
                if marks.interested_active { '*' } else { ' ' },
                if marks.not_interested_active { 'x' } else { ' ' },
                if listing.contact { 'c' } else { ' ' },
                listing.detail_id,
                listing.display_str("name").unwrap_or("-"),
                listing.display_str("seller").unwrap_or(""),
            );
        }
    }
    let label = view.results_label();
    if !label.is_empty() {
        println!("{label}");
    }
}
