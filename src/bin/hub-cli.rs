use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "hub-cli")]
#[command(about = "Command line client for the lineage hub API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000", env = "LINEAGE_HUB_URL")]
    url: String,

    #[arg(short, long, env = "LINEAGE_HUB_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show hub and dependency health
    Health,
    /// List visible namespaces
    Namespaces,
    /// Show one namespace
    Namespace { name: String },
    /// Send lineage events from a JSON file (an array of events)
    SendLineage {
        #[arg(short, long)]
        namespace: String,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Health => client.get(format!("{}/health", cli.url)),
        Commands::Namespaces => client.get(format!("{}/namespaces", cli.url)),
        Commands::Namespace { name } => client.get(format!("{}/namespaces/{}", cli.url, name)),
        Commands::SendLineage { namespace, file } => {
            let events: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            client
                .post(format!("{}/lineage/ingest", cli.url))
                .json(&json!({ "namespace": namespace, "events": events, "source": "hub-cli" }))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: hub returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
