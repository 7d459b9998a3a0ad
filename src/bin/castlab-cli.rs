use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "castlab-cli")]
#[command(about = "Management CLI for the CastLab service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Status,
    /// List all experiments
    List,
    /// Show one experiment with on-chain totals
    Show { id: u64 },
    /// Create an experiment listing
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "")]
        creator: String,
        #[arg(long)]
        goal_usd: String,
    },
    /// Fund an experiment (approve + deposit)
    Fund { id: u64, amount_usd: String },
    /// Retry a deposit parked after a failed attempt
    RetryDeposit { id: u64 },
    /// Withdraw deposited funds
    Withdraw { id: u64, amount_usd: String },
    /// Place a bet on an outcome (0 or 1)
    Bet { id: u64, outcome: u8, amount_usd: String },
    /// Claim winnings from a resolved experiment
    Claim { id: u64 },
    /// Show the service wallet's balance and allowance
    Wallet,
    /// Mint test tokens to the service wallet
    Mint { amount_usd: String },
    /// Show a user's on-chain position
    Position { id: u64, address: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url;

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            print_response(res).await?;
        }
        Commands::List => {
            let res = client.get(format!("{base}/api/experiments")).send().await?;
            print_response(res).await?;
        }
        Commands::Show { id } => {
            let res = client.get(format!("{base}/api/experiments/{id}")).send().await?;
            print_response(res).await?;
        }
        Commands::Create { title, summary, creator, goal_usd } => {
            let body = json!({
                "title": title,
                "summary": summary,
                "creator": creator,
                "funding_goal_usd": goal_usd,
            });
            let res = client
                .post(format!("{base}/api/experiments"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Fund { id, amount_usd } => {
            let res = client
                .post(format!("{base}/api/experiments/{id}/fund"))
                .json(&json!({ "amount_usd": amount_usd }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::RetryDeposit { id } => {
            let res = client
                .post(format!("{base}/api/experiments/{id}/deposit/retry"))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Withdraw { id, amount_usd } => {
            let res = client
                .post(format!("{base}/api/experiments/{id}/withdraw"))
                .json(&json!({ "amount_usd": amount_usd }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Bet { id, outcome, amount_usd } => {
            let res = client
                .post(format!("{base}/api/experiments/{id}/bet"))
                .json(&json!({ "outcome": outcome, "amount_usd": amount_usd }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Claim { id } => {
            let res = client
                .post(format!("{base}/api/experiments/{id}/claim"))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Wallet => {
            let res = client.get(format!("{base}/api/wallet")).send().await?;
            print_response(res).await?;
        }
        Commands::Mint { amount_usd } => {
            let res = client
                .post(format!("{base}/api/faucet/mint"))
                .json(&json!({ "amount_usd": amount_usd }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Position { id, address } => {
            let res = client
                .get(format!("{base}/api/experiments/{id}/position/{address}"))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
