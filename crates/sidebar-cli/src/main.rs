use anyhow::Result;
use clap::{Parser, Subcommand};
use sidebar_config::{AuthMethod, FileSettingsStore, ProviderId};
use sidebar_security::RedactingWriter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod page;
mod render;

#[derive(Parser)]
#[command(name = "sidebar", version)]
#[command(about = "Chat with on-device, local and cloud language models about the page you are reading", long_about = None)]
struct Cli {
    /// Settings file [default: <config dir>/sidebar/settings.yaml]
    #[arg(long, global = true, env = "SIDEBAR_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation
    Chat {
        /// Provider to use instead of the configured one
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Page to read context from
        #[arg(long)]
        page: Option<String>,
    },
    /// Ask a single question and print the reply
    Ask {
        prompt: String,

        #[arg(long)]
        provider: Option<ProviderId>,

        #[arg(long)]
        page: Option<String>,

        /// Attach the page from --page to the question
        #[arg(long, requires = "page")]
        context: bool,
    },
    /// Inspect or edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the settings with credentials masked
    Show,
    /// Print the settings file location
    Path,
    /// Configure a provider and make it active
    SetProvider {
        provider: ProviderId,

        #[arg(long)]
        endpoint: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        credential: Option<String>,

        /// api_key, bearer (oauth) or none
        #[arg(long)]
        auth: Option<AuthMethod>,
    },
}

fn init_tracing(verbose: u8, json: bool) {
    let default_directives = match verbose {
        0 => "warn,sidebar=info,sidebar_agents=info,sidebar_config=info",
        1 => "warn,sidebar=debug,sidebar_agents=debug,sidebar_config=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(RedactingWriter::stderr());

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let store = match cli.config {
        Some(path) => FileSettingsStore::new(path),
        None => FileSettingsStore::open_default()?,
    };

    match cli.command {
        Commands::Chat { provider, page } => {
            commands::chat::run(&store, provider, page.as_deref()).await?
        }
        Commands::Ask {
            prompt,
            provider,
            page,
            context,
        } => commands::ask::run(&store, &prompt, provider, page.as_deref(), context).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&store)?,
            ConfigAction::Path => commands::config::path(&store),
            ConfigAction::SetProvider {
                provider,
                endpoint,
                model,
                credential,
                auth,
            } => commands::config::set_provider(
                &store,
                provider,
                commands::config::ProviderOverrides {
                    endpoint,
                    model,
                    credential,
                    auth,
                },
            )?,
        },
    }

    Ok(())
}
