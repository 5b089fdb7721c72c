use std::collections::BTreeMap;
use std::time::Instant;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and exercise a running overload guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active strategy and its state
    Status,
    /// Fire concurrent requests and tally the responses by status
    Burst {
        /// Number of simultaneous requests
        #[arg(short, long, default_value_t = 12)]
        concurrency: usize,

        /// Path to request, e.g. / or /fail
        #[arg(short, long, default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url)).send().await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: status endpoint returned {}", status);
                return Ok(());
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Burst { concurrency, path } => {
            let url = format!("{}{}", cli.url, path);
            let started = Instant::now();
            let results = join_all((0..concurrency).map(|_| client.get(&url).send())).await;

            let mut tally: BTreeMap<String, usize> = BTreeMap::new();
            for result in results {
                let key = match result {
                    Ok(res) => res.status().as_u16().to_string(),
                    Err(_) => "error".to_string(),
                };
                *tally.entry(key).or_default() += 1;
            }

            let report = json!({
                "url": url,
                "requests": concurrency,
                "elapsed_ms": started.elapsed().as_millis() as u64,
                "statuses": tally,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
