use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use carelog_core::{accounts, config, db, logging, migrations};

#[derive(Parser)]
#[command(name = "carelog", version, about = "Carelog backend CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API service.
    Api,
    /// Apply pending database migrations.
    Migrate,
    /// Create the first account if the store is empty.
    Bootstrap(BootstrapArgs),
}

#[derive(Args)]
struct BootstrapArgs {
    #[arg(long, env = "BOOTSTRAP_EMAIL")]
    email: String,
    #[arg(long, env = "BOOTSTRAP_PASSWORD")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Api => {
            let config = carelog_api::load_config()?;
            carelog_api::run(config).await
        }
        Commands::Migrate => {
            logging::init("carelog-cli");
            let database_url = config::database_url_from_env()?;
            let pool = db::connect(&database_url, 2).await?;
            migrations::run(&pool).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
        Commands::Bootstrap(args) => {
            logging::init("carelog-cli");
            let database_url = config::database_url_from_env()?;
            let pool = db::connect(&database_url, 2).await?;
            let created = accounts::bootstrap_account(&pool, &args.email, &args.password).await?;
            if created {
                tracing::info!(email = %args.email, "account created");
            } else {
                tracing::info!("accounts already exist, nothing to do");
            }
            Ok(())
        }
    }
}
