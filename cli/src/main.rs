mod avatar;
mod commands;
mod config;
mod mailer;
mod random;
mod server;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    CaloriesArgs, cmd_calories, cmd_meals_import, cmd_meals_list, cmd_users_list,
};
use crate::config::Config;
use crate::mailer::{LogMailer, Mailer, SpoolMailer};
use crate::server::ServerSettings;
use mealmind_core::service::MealMindService;

#[derive(Parser)]
#[command(
    name = "mealmind",
    version,
    about = "A diet planner that turns your goal into a daily meal plan"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web application
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Public origin used in password reset links (default: http://<bind>:<port>)
        #[arg(long)]
        base_url: Option<String>,
        /// Mark session cookies Secure (use behind an HTTPS proxy)
        #[arg(long)]
        secure_cookies: bool,
        /// Log outgoing mail instead of spooling it to the outbox directory
        #[arg(long)]
        mail_log: bool,
    },
    /// Compute a daily calorie target without an account
    Calories {
        /// Male or Female
        #[arg(long)]
        gender: String,
        /// Weight in kg
        #[arg(long)]
        weight: f64,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Age in years
        #[arg(long)]
        age: i64,
        /// sedentary, lightly-active, moderately-active, very-active, extra-active
        #[arg(long, default_value = "sedentary")]
        activity: String,
        /// lose-weight, maintain-weight, gain-weight
        #[arg(long, default_value = "maintain-weight")]
        goal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the meal catalog
    Meals {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Inspect registered accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Import meals from a CSV file (Name, Calories, Label, optional Photo)
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List catalog meals
    List {
        /// Only show one slot: breakfast, lunch, dinner
        #[arg(short, long)]
        label: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List registered users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open_service() -> Result<(Config, MealMindService)> {
    let config = Config::load()?;
    let (secret, _) = config.load_or_create_secret_key()?;
    let service = MealMindService::open(&config.db_path, secret.as_bytes())?;
    service.seed_catalog_if_empty()?;
    Ok((config, service))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            port,
            bind,
            base_url,
            secure_cookies,
            mail_log,
        } => {
            let (config, service) = open_service()?;
            let mailer: Arc<dyn Mailer> = if mail_log {
                Arc::new(LogMailer)
            } else {
                eprintln!("Spooling mail to {}", config.outbox_dir.display());
                Arc::new(SpoolMailer::new(config.outbox_dir.clone()))
            };
            let settings = ServerSettings {
                base_url: base_url.unwrap_or_else(|| format!("http://{bind}:{port}")),
                static_dir: config.static_dir.clone(),
                secure_cookies,
            };
            server::start_server(service, mailer, settings, &bind, port).await
        }
        Commands::Calories {
            gender,
            weight,
            height,
            age,
            activity,
            goal,
            json,
        } => cmd_calories(
            &CaloriesArgs {
                gender: &gender,
                weight_kg: weight,
                height_cm: height,
                age,
                activity: &activity,
                goal: &goal,
            },
            json,
        ),
        Commands::Meals { command } => {
            let (_, service) = open_service()?;
            match command {
                MealCommands::Import {
                    file,
                    dry_run,
                    json,
                } => cmd_meals_import(&service, &file, dry_run, json),
                MealCommands::List { label, json } => {
                    cmd_meals_list(&service, label.as_deref(), json)
                }
            }
        }
        Commands::Users { command } => {
            let (_, service) = open_service()?;
            match command {
                UserCommands::List { json } => cmd_users_list(&service, json),
            }
        }
    }
}
