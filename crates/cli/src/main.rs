//! Job Board CLI - command-line client for the listing daemon's JSON-RPC API

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9640";

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Job Board listing lifecycle CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "JOBBOARD_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Args, Debug, Clone)]
struct ContentArgs {
    #[arg(long)]
    title: String,

    #[arg(long)]
    description: String,

    /// full-time, part-time, contract, internship
    #[arg(long, default_value = "full-time")]
    employment_type: String,

    #[arg(long)]
    location: String,

    #[arg(long, default_value = "0")]
    salary_from: i64,

    #[arg(long, default_value = "0")]
    salary_to: i64,

    /// Repeat for several benefits
    #[arg(long = "benefit")]
    benefits: Vec<String>,
}

impl ContentArgs {
    fn to_json(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
            "employment_type": self.employment_type,
            "location": self.location,
            "salary_from": self.salary_from,
            "salary_to": self.salary_to,
            "benefits": self.benefits,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a listing and print the checkout URL
    Create {
        /// Owner (employer) ID
        #[arg(short, long)]
        owner: String,

        /// Listing duration in days (see `tiers`)
        #[arg(short, long)]
        days: u32,

        /// Reuse to make retries safe
        #[arg(long)]
        idempotency_key: Option<String>,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Replace a listing's content
    Update {
        posting_id: String,

        #[arg(short, long)]
        owner: String,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Show one listing
    Show { posting_id: String },

    /// List an owner's listings
    List {
        #[arg(short, long)]
        owner: String,
    },

    /// Delete a listing
    Delete {
        posting_id: String,

        #[arg(short, long)]
        owner: String,
    },

    /// Start a new checkout for an unpaid listing
    RetryPayment {
        posting_id: String,

        #[arg(short, long)]
        owner: String,
    },

    /// Report a payment result (daemon in sandbox mode only)
    CompletePayment {
        posting_id: String,

        /// Record a failed payment instead of a successful one
        #[arg(long)]
        failed: bool,
    },

    /// Show pricing tiers
    Tiers,

    /// Show system status
    Status,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Tabled)]
struct ListingRow {
    id: String,
    title: String,
    status: String,
    days: u64,
    created: String,
    expires: String,
}

impl ListingRow {
    fn from_json(listing: &Value) -> Self {
        Self {
            id: text(&listing["id"]),
            title: text(&listing["content"]["title"]),
            status: text(&listing["status"]),
            days: listing["listing_duration_days"].as_u64().unwrap_or(0),
            created: format_millis(listing["created_at"].as_i64()),
            expires: format_millis(listing["expires_at"].as_i64()),
        }
    }
}

#[derive(Deserialize, Tabled)]
struct TierRow {
    days: u32,
    price: u32,
    description: String,
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or("-").to_string()
}

fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn colored_status(status: &str) -> String {
    match status {
        "ACTIVE" => status.green().to_string(),
        "PENDING_PAYMENT" => status.yellow().to_string(),
        "EXPIRED" => status.red().to_string(),
        other => other.to_string(),
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_listing(listing: &Value) {
    println!("  {} {}", "ID:".bold(), text(&listing["id"]));
    println!("  {} {}", "Owner:".bold(), text(&listing["owner_id"]));
    println!("  {} {}", "Title:".bold(), text(&listing["content"]["title"]));
    println!(
        "  {} {}",
        "Status:".bold(),
        colored_status(&text(&listing["status"]))
    );
    println!("  {} {}", "Location:".bold(), text(&listing["content"]["location"]));
    println!(
        "  {} {} - {}",
        "Salary:".bold(),
        listing["content"]["salary_from"],
        listing["content"]["salary_to"]
    );
    println!(
        "  {} {} days",
        "Duration:".bold(),
        listing["listing_duration_days"]
    );
    println!(
        "  {} {}",
        "Created:".bold(),
        format_millis(listing["created_at"].as_i64())
    );
    println!(
        "  {} {}",
        "Expires:".bold(),
        format_millis(listing["expires_at"].as_i64())
    );
    if let Some(url) = listing["checkout_url"].as_str() {
        println!("  {} {}", "Checkout:".bold(), url);
    }
}

fn print_checkout(result: &Value) {
    println!("  {} {}", "Posting:".bold(), text(&result["posting_id"]));
    println!(
        "  {} {}",
        "Status:".bold(),
        colored_status(&text(&result["status"]))
    );
    println!("  {} {}", "Pay at:".bold(), text(&result["redirect_url"]));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            owner,
            days,
            idempotency_key,
            content,
        } => {
            let params = json!({
                "owner_id": owner,
                "duration_days": days,
                "idempotency_key": idempotency_key,
                "content": content.to_json(),
            });

            let result = call_rpc(&cli.rpc_url, "listing.create.v1", params).await?;
            println!("{}", "✓ Listing created".green().bold());
            println!();
            print_checkout(&result);
        }

        Commands::Update {
            posting_id,
            owner,
            content,
        } => {
            let params = json!({
                "posting_id": posting_id,
                "owner_id": owner,
                "content": content.to_json(),
            });

            let listing = call_rpc(&cli.rpc_url, "listing.update.v1", params).await?;
            println!("{}", "✓ Listing updated".green().bold());
            println!();
            print_listing(&listing);
        }

        Commands::Show { posting_id } => {
            let params = json!({ "posting_id": posting_id });
            let listing = call_rpc(&cli.rpc_url, "listing.get.v1", params).await?;
            print_listing(&listing);
        }

        Commands::List { owner } => {
            let params = json!({ "owner_id": owner });
            let result = call_rpc(&cli.rpc_url, "listing.list.v1", params).await?;

            let rows: Vec<ListingRow> = result["listings"]
                .as_array()
                .map(|listings| listings.iter().map(ListingRow::from_json).collect())
                .unwrap_or_default();

            if rows.is_empty() {
                println!("{}", format!("No listings for {}", owner).yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Delete { posting_id, owner } => {
            let params = json!({ "posting_id": posting_id, "owner_id": owner });
            call_rpc(&cli.rpc_url, "listing.delete.v1", params).await?;
            println!(
                "{}",
                format!("✓ Listing {} deleted", posting_id).green().bold()
            );
        }

        Commands::RetryPayment { posting_id, owner } => {
            let params = json!({ "posting_id": posting_id, "owner_id": owner });
            let result = call_rpc(&cli.rpc_url, "listing.retry_payment.v1", params).await?;
            println!("{}", "✓ New checkout started".green().bold());
            println!();
            print_checkout(&result);
        }

        Commands::CompletePayment { posting_id, failed } => {
            let outcome = if failed { "failure" } else { "success" };
            let params = json!({ "posting_id": posting_id, "outcome": outcome });
            let result = call_rpc(&cli.rpc_url, "payment.complete.v1", params).await?;

            match result["transition"]["result"].as_str() {
                Some("applied") => println!(
                    "{}",
                    format!("✓ Listing {} is now ACTIVE", posting_id).green().bold()
                ),
                Some("unchanged") => println!(
                    "{} listing stays {}",
                    "○".bold(),
                    colored_status(&text(&result["transition"]["current"]))
                ),
                _ => println!("{}", format!("Listing {} not found", posting_id).yellow()),
            }
        }

        Commands::Tiers => {
            let result = call_rpc(&cli.rpc_url, "pricing.tiers.v1", json!({})).await?;
            let tiers: Vec<TierRow> = serde_json::from_value(result["tiers"].clone())
                .context("Unexpected pricing response")?;
            println!("{}", Table::new(tiers));
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Listings:".bold(), stats["total_listings"]);
                    println!("  {} {}", "Pending Payment:".bold(), stats["pending_payment"]);
                    println!("  {} {}", "Active:".bold(), stats["active"]);
                    println!("  {} {}", "Expired:".bold(), stats["expired"]);
                    println!("  {} {}", "Pending Timers:".bold(), stats["pending_timers"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
