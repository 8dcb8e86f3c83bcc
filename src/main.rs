use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use lead_tier::leads::{InteractionId, InteractionKind, LeadAttributes, LeadId};
use lead_tier::{LeadError, LeadSystem};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_PERSISTENCE: i32 = 2;
const EXIT_CONFIG: i32 = 4;
const EXIT_INPUT: i32 = 5;

#[derive(Subcommand, Debug)]
enum Commands {
    /// List leads by score (default if no subcommand)
    List {
        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
    },
    /// Add a lead and score it
    Create {
        /// Company name
        company_name: String,
        #[arg(long)]
        industry: Option<String>,
        /// Number of employees
        #[arg(long)]
        size: Option<u64>,
        #[arg(long)]
        country: Option<String>,
        /// Contact address for outreach
        #[arg(long)]
        email: Option<String>,
    },
    /// Record an engagement event and rescore the lead
    Record {
        lead_id: u64,
        /// website_visit, email_open, content_download, meeting, or any other label
        kind: String,
        #[arg(long)]
        details: Option<String>,
    },
    /// Re-apply a logged interaction (no-op if already applied)
    Replay { interaction_id: u64 },
    /// Show a lead's score and tier
    Score { lead_id: u64 },
    /// Record a lead's conversion outcome
    Convert {
        lead_id: u64,
        /// Mark the lead as not converted
        #[arg(long)]
        no: bool,
    },
    /// Train a new classifier model from labeled leads
    Retrain,
}

#[derive(Parser, Debug)]
#[command(name = "lead-tier")]
#[command(about = "Lead scoring and tiering CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/lead-tier/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn exit_code(error: &LeadError) -> i32 {
    match error {
        LeadError::Persistence(_) => EXIT_PERSISTENCE,
        LeadError::Validation(_)
        | LeadError::MissingFeature { .. }
        | LeadError::LeadNotFound(_)
        | LeadError::InteractionNotFound(_)
        | LeadError::TrainingData(_) => EXIT_INPUT,
        _ => EXIT_FAILURE,
    }
}

async fn run(command: Commands, system: &LeadSystem, use_colors: bool) -> Result<(), LeadError> {
    match command {
        Commands::List { tsv } => {
            let leads = system.list_leads()?;
            if tsv {
                println!("{}", lead_tier::output::format_tsv(&leads));
            } else {
                println!("{}", lead_tier::output::format_lead_table(&leads, use_colors));
            }
        }
        Commands::Create {
            company_name,
            industry,
            size,
            country,
            email,
        } => {
            let outcome = system
                .create_lead(LeadAttributes {
                    company_name,
                    industry,
                    company_size: size,
                    country,
                    contact_email: email,
                })
                .await?;
            println!("{}", lead_tier::output::format_lead_detail(&outcome.lead, use_colors));
            if let Some(transition) = outcome.transition {
                println!("{}", lead_tier::output::format_transition(&transition, use_colors));
            }
        }
        Commands::Record {
            lead_id,
            kind,
            details,
        } => {
            let recorded = system
                .record_interaction(LeadId(lead_id), InteractionKind::from(kind), details)
                .await?;
            let lead = &recorded.outcome.lead;
            println!(
                "Interaction {} recorded. Lead {} score {} ({})",
                recorded.interaction.id,
                lead.id,
                lead_tier::output::format_score(lead.score),
                lead_tier::output::format_tier(lead.tier, use_colors)
            );
            if let Some(transition) = recorded.outcome.transition {
                println!("{}", lead_tier::output::format_transition(&transition, use_colors));
            }
        }
        Commands::Replay { interaction_id } => {
            match system.replay_interaction(InteractionId(interaction_id)).await? {
                Some(outcome) => {
                    println!(
                        "Lead {} rescored: {} ({})",
                        outcome.lead.id,
                        lead_tier::output::format_score(outcome.lead.score),
                        lead_tier::output::format_tier(outcome.lead.tier, use_colors)
                    );
                    if let Some(transition) = outcome.transition {
                        println!("{}", lead_tier::output::format_transition(&transition, use_colors));
                    }
                }
                None => println!("Interaction {} already applied, nothing to do.", interaction_id),
            }
        }
        Commands::Score { lead_id } => {
            let lead = system.get_lead(LeadId(lead_id))?;
            println!("{}", lead_tier::output::format_lead_detail(&lead, use_colors));
        }
        Commands::Convert { lead_id, no } => {
            let lead = system.set_conversion(LeadId(lead_id), !no).await?;
            println!(
                "Lead {} marked as {}",
                lead.id,
                if no { "not converted" } else { "converted" }
            );
        }
        Commands::Retrain => {
            let outcome = system.retrain_model().await?;
            println!("{}", lead_tier::output::format_retrain(&outcome));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::List { tsv: false });
    let start_time = Instant::now();

    lead_tier::logging::init_tracing(cli.verbose);

    // Load config
    let config = match lead_tier::config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Validate config at startup
    if let Err(errors) = lead_tier::config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let system = match LeadSystem::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open lead store: {:#}", e);
            std::process::exit(EXIT_PERSISTENCE);
        }
    };

    let use_colors = lead_tier::output::should_use_colors();
    let result = run(command, &system, use_colors).await;

    // Let queued notifications finish before exiting
    system.shutdown().await;

    if cli.verbose {
        eprintln!("Done in {:?}", start_time.elapsed());
    }

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
