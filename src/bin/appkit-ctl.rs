use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "appkit-ctl")]
#[command(about = "Inspect a running appkit service through its admin endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service identity, lifecycle state and async work in flight
    Status,
    /// Registered events and their processor counts
    Events,
    /// Raw Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match cli.command {
        Commands::Status => "/status",
        Commands::Events => "/events",
        Commands::Metrics => "/metrics",
    };
    let res = client.get(format!("{}{}", cli.url, path)).send().await?;

    if matches!(cli.command, Commands::Metrics) {
        let status = res.status();
        let text = res.text().await?;
        if status.is_success() {
            println!("{}", text);
        } else {
            eprintln!("Error: admin endpoint returned status {}: {}", status, text);
        }
        return Ok(());
    }

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
