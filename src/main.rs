use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use scratch_uri::{build_dispatcher, load_settings};

#[derive(Parser, Debug)]
#[command(name = "scratch-uri")]
#[command(about = "Handle a scratch:// action URL against a notes folder", long_about = None)]
struct Cli {
    /// The full action URL, e.g. scratch://actions/note/get?file=inbox
    url: String,

    /// Settings file
    #[arg(short, long, env = "SCRATCH_URI_CONFIG", default_value = "scratch-uri.json")]
    config: PathBuf,

    /// Notes folder, overriding the one in the settings file
    #[arg(long)]
    vault: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scratch_uri=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(vault) = cli.vault {
        settings.notes_folder = Some(vault);
    }

    let dispatcher = build_dispatcher(settings)?;
    let result = dispatcher.handle_url(&cli.url).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
