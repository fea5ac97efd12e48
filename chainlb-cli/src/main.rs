//! Chainlb CLI Tool
//!
//! Command line interface for checking node configuration and balancing

use anyhow::Result;
use chainlb_core::config::loader::load_config_from_path;
use chainlb_loadbalance::loadbalance::selector::current_weights;
use chainlb_loadbalance::{HealthChecker, NodeBalanceService, NodeProbe};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainlb-cli")]
#[command(about = "A CLI tool for checking blockchain node balancing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config_example.toml")]
        output: String,
    },
    /// Probe every configured node once
    HealthCheck {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
        /// Only check nodes of this chain
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Run one health actualization and sample the load balancer
    PickEndpoint {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
        /// Chain to pick nodes for
        #[arg(long)]
        chain: u64,
        /// Number of picks
        #[arg(long, default_value_t = 100)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match load_config_from_path(&config) {
                Ok(cfg) => {
                    let endpoints = cfg.nodes.endpoints()?;
                    println!("✅ Configuration is valid");
                    println!("  - {} networks configured", cfg.nodes.url.len());
                    println!("  - {} node endpoints configured", endpoints.len());
                    println!(
                        "  - contract cache {}",
                        if cfg.contracts.disabled { "disabled" } else { "enabled" }
                    );
                    println!(
                        "  - synchronisation {}",
                        if cfg.synchronisation.disabled { "disabled" } else { "enabled" }
                    );
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            std::fs::write(&output, EXAMPLE_CONFIG)?;
            println!("✅ Configuration file generated successfully");
        }
        Commands::HealthCheck { config, chain } => {
            let cfg = load_config_from_path(&config)?;
            health_check(&cfg, chain).await?;
        }
        Commands::PickEndpoint {
            config,
            chain,
            samples,
        } => {
            let cfg = load_config_from_path(&config)?;
            pick_endpoint(&cfg, chain, samples).await?;
        }
    }

    Ok(())
}

/// 逐个探测节点并打印 `healthy:latency`
async fn health_check(config: &chainlb_core::Config, chain: Option<u64>) -> Result<()> {
    let checker = HealthChecker::new(config.nodes.node_timeout())?;
    let endpoints: Vec<_> = config
        .nodes
        .endpoints()?
        .into_iter()
        .filter(|e| chain.map_or(true, |id| e.chain_id == id))
        .collect();

    if endpoints.is_empty() {
        eprintln!("❌ No endpoints configured{}", chain.map(|id| format!(" for chain {}", id)).unwrap_or_default());
        std::process::exit(1);
    }

    println!("Performing health check for {} endpoints...", endpoints.len());
    let mut healthy = 0;
    for endpoint in &endpoints {
        let status = checker.check(&endpoint.url).await;
        let icon = if status.healthy { "🟢" } else { "🔴" };
        println!("{} [{}] {} {}", icon, endpoint.chain_id, endpoint.url, status);
        if status.healthy {
            healthy += 1;
        }
    }

    println!();
    println!("Healthy: {}/{}", healthy, endpoints.len());
    if healthy == 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// 完成一轮健康检查后多次调用负载均衡器，统计每个节点被选中的次数
async fn pick_endpoint(config: &chainlb_core::Config, chain: u64, samples: usize) -> Result<()> {
    let service = NodeBalanceService::new(config)?;

    let healthy = service.actualizer().actualize().await;
    info!("Health actualization finished with {} healthy endpoints", healthy);

    let snapshot: BTreeMap<_, _> = service.actualizer().snapshot().into_iter().collect();
    for (chain_id, statuses) in &snapshot {
        println!("[{}] {} healthy endpoints", chain_id, statuses.len());
    }
    println!();

    let candidates = service.actualizer().healthy(chain);
    println!("📊 Healthy endpoints for chain {}", chain);
    println!("==============================");
    for (status, (_, weight)) in candidates.iter().zip(current_weights(&candidates)) {
        println!(
            "{} latency {}ms, selection probability {:.2}%",
            status.url,
            status.latency_millis,
            weight * 100.0
        );
    }
    println!();

    let mut picks: BTreeMap<String, usize> = BTreeMap::new();
    for _ in 0..samples {
        let url = service.balancer().get_actual_url(chain).await?;
        *picks.entry(url.to_string()).or_default() += 1;
    }

    println!("🎯 {} picks", samples);
    println!("==============================");
    for (url, count) in &picks {
        println!("{} {} ({:.2}%)", url, count, *count as f64 * 100.0 / samples.max(1) as f64);
    }
    Ok(())
}

const EXAMPLE_CONFIG: &str = r#"# Chainlb Configuration File

[nodes]
balancer_timeout_ms = 10000
balancer_sleep_ms = 3000
node_timeout_seconds = 15

# chain id -> comma separated node urls
[nodes.url]
"1" = "https://eth.llamarpc.com, https://rpc.ankr.com/eth"
"137" = "https://polygon-rpc.com"

[nodes.headers]
"User-Agent" = "chainlb"

[nodes.health]
logging_level = "debug"
refresh_timeout_ms = 10000
check_delay_seconds = 60
first_delay_ms = 1000
threads = 20

[contracts]
lifetime_seconds = 600
clear_delay_ms = 2000
# pk = "<64 hex characters>"

[synchronisation]
lock_timeout_seconds = 600
clear_delay_seconds = 60
"#;
