mod refresh;
mod upstream;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::refresh::RefreshCommands;
use crate::upstream::UpstreamCommands;

#[derive(Debug, Parser)]
#[command(name = "zoodro-cli")]
#[command(about = "Zoodro vendor map command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run or inspect vendor refresh cycles
    Refresh {
        #[command(subcommand)]
        command: RefreshCommands,
    },
    /// Talk to the upstream vendor API directly
    Upstream {
        #[command(subcommand)]
        command: UpstreamCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("zoodro-cli: no command given; see --help");
        return Ok(());
    };

    let config = zoodro_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    zoodro_db::health_check(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = zoodro_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
        Commands::Refresh { command } => match command {
            RefreshCommands::Run { dry_run } => {
                if dry_run {
                    refresh::run_refresh_dry(&config).await?;
                } else {
                    let pool = connect(&config).await?;
                    refresh::run_refresh(&pool, &config).await?;
                }
            }
            RefreshCommands::History { limit } => {
                let pool = connect(&config).await?;
                refresh::run_refresh_history(&pool, limit).await?;
            }
        },
        Commands::Upstream { command } => match command {
            UpstreamCommands::Page { page, size } => {
                upstream::run_upstream_page(&config, page, size).await?;
            }
            UpstreamCommands::Detail { vendor_id } => {
                upstream::run_upstream_detail(&config, vendor_id).await?;
            }
        },
    }

    Ok(())
}

async fn connect(config: &zoodro_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = zoodro_db::PoolConfig::from_app_config(config);
    let pool = zoodro_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}
