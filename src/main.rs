//! endpoint-balancer CLI.
//!
//! Loads a balancer configuration and exercises it against live endpoints.
//!
//! ```text
//! endpoint-balancer --config balancer.toml check --rounds 10
//! endpoint-balancer --config balancer.toml stats
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use endpoint_balancer::config::{load_config, BalancerConfig};
use endpoint_balancer::observability::{logging, metrics};
use endpoint_balancer::{BalancerOptions, DnsResolver, RequestBalancer};

type Balancer = RequestBalancer<String, reqwest::Error>;

#[derive(Parser)]
#[command(name = "endpoint-balancer")]
#[command(about = "Spread HTTP requests over redundant endpoints", long_about = None)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "balancer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send GET requests through the balancer and report each outcome
    Check {
        #[arg(short, long, default_value_t = 1)]
        rounds: usize,
    },
    /// Validate the configuration and list the endpoints in use
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(config = %cli.config.display(), policy = ?config.policy, "endpoint-balancer starting");

    if config.observability.metrics_enabled {
        // validate_config already checked the address.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs.unwrap_or(30)))
        .build()?;
    let balancer = build_balancer(&config, &client).await?;

    match cli.command {
        Commands::Check { rounds } => {
            for round in 1..=rounds {
                let outcome = balancer
                    .request(|endpoint| {
                        let client = client.clone();
                        async move {
                            let res = client.get(to_url(&endpoint)).send().await?.error_for_status()?;
                            Ok::<_, reqwest::Error>((endpoint, res.status().as_u16()))
                        }
                    })
                    .await;
                let line = match outcome {
                    Ok((endpoint, status)) => json!({ "round": round, "endpoint": endpoint, "status": status }),
                    Err(e) => json!({ "round": round, "error": e.to_string() }),
                };
                println!("{}", line);
            }
            print_stats(&balancer)?;
        }
        Commands::Stats => print_stats(&balancer)?,
    }

    Ok(())
}

async fn build_balancer(config: &BalancerConfig, client: &reqwest::Client) -> Result<Balancer, Box<dyn std::error::Error>> {
    let mut options: BalancerOptions<String, reqwest::Error> = BalancerOptions::from_config(config);
    if let Some(path) = config.health.probe_path.clone() {
        let client = client.clone();
        options = options.health_check(move |endpoint: String| {
            let request = client.get(format!("{}{}", to_url(&endpoint).trim_end_matches('/'), path));
            async move { Ok::<_, reqwest::Error>(request.send().await?.status().is_success()) }
        });
    }

    let balancer = if config.resolve.interval_secs.is_some() {
        Balancer::with_resolver(&config.endpoints, options, DnsResolver::new(config.resolve.attempts)).await?
    } else {
        Balancer::new(&config.endpoints, options)?
    };
    Ok(balancer)
}

fn print_stats(balancer: &Balancer) -> Result<(), Box<dyn std::error::Error>> {
    let stats: serde_json::Map<String, serde_json::Value> = balancer
        .get_stats()
        .into_iter()
        .map(|(endpoint, label)| (endpoint, json!(label)))
        .collect();
    let report = json!({
        "policy": balancer.policy_name(),
        "endpoints": balancer.endpoints(),
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Bare `host:port` endpoints are spoken to over plain HTTP.
fn to_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}
