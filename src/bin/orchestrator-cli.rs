use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "orchestrator-cli")]
#[command(about = "Management CLI for the assistant orchestrator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show health of every backend
    Status,
    /// Show circuit breaker diagnostics
    Breakers,
    /// Show the advisory best backend
    Best,
    /// Submit a query
    Ask {
        /// draft_analysis, trade_evaluation, lineup_optimization, player_comparison or free_form
        #[arg(short, long, default_value = "free_form")]
        kind: String,

        /// JSON context forwarded to the backend
        #[arg(short, long)]
        context: Option<String>,

        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", cli.url)).send().await?,
        Commands::Breakers => client.get(format!("{}/circuit-breakers", cli.url)).send().await?,
        Commands::Best => client.get(format!("{}/best-backend", cli.url)).send().await?,
        Commands::Ask { kind, context, query } => {
            let kind: assistant_orchestrator::orchestrator::RequestKind = kind.parse()?;
            let context: Value = match context {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            let body = json!({
                "requestId": uuid::Uuid::new_v4().to_string(),
                "kind": kind,
                "queryText": query,
                "contextPayload": context,
            });
            client.post(format!("{}/query", cli.url)).json(&body).send().await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: orchestrator returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
