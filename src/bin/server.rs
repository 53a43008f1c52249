//! Allowlist admin and proof-lookup server.
//!
//! Reads a TOML config (see `AppConfig`), opens the configured campaign
//! store, connects one mint gate per configured campaign and serves the
//! HTTP routes until Ctrl-C.
//!
//! Run with: `cargo run --bin server -- --config allowlist.toml`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use pop_allowlist::adapters::configured_store::ConfiguredStore;
use pop_allowlist::adapters::ethereum::EthereumMintGate;
use pop_allowlist::config::AppConfig;
use pop_allowlist::ports::store::CampaignStore;
use pop_allowlist::registry::EligibilityRegistry;
use pop_allowlist::server;
use pop_allowlist::sync::RootSync;

#[derive(Parser)]
#[command(name = "server", about = "Merkle allowlist HTTP server")]
struct Cli {
    #[arg(long, env = "ALLOWLIST_CONFIG", default_value = "allowlist.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("allowlist server starting...");

    // ── Load config ───────────────────────────────────────────────────────────
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;

    // ── Store ─────────────────────────────────────────────────────────────────
    let store = ConfiguredStore::open(&config.store)
        .await
        .context("cannot open campaign store")?;
    info!(backend = ?config.store.backend, "campaign store ready");

    // ── Mint gates ────────────────────────────────────────────────────────────
    let gates = build_gates(&config, &store).await?;
    info!(gates = gates.len(), "mint gates ready");

    // ── Root sync ─────────────────────────────────────────────────────────────
    let registry = Arc::new(EligibilityRegistry::new(store));
    let mut sync = RootSync::new(registry, gates);
    if let Some(chain) = &config.chain {
        sync = sync.with_call_timeout(chain.call_timeout);
    }

    // ── Serve ─────────────────────────────────────────────────────────────────
    let (handle, bound_addr) = server::start_server(Arc::new(sync), config.server.listen_addr)
        .await
        .context("cannot start server")?;
    info!(%bound_addr, "ready");

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    handle.shutdown().await?;
    Ok(())
}

/// One gate per `[[mint_gates]]` entry, plus any stored campaign that
/// records a contract address and is not listed in the config.
async fn build_gates(
    config: &AppConfig,
    store: &ConfiguredStore,
) -> anyhow::Result<HashMap<String, EthereumMintGate>> {
    let mut gates = HashMap::new();
    let Some(chain) = &config.chain else {
        warn!("no [chain] section; serving without mint gates");
        return Ok(gates);
    };
    if chain.admin_private_key.is_none() {
        warn!("no chain.admin_private_key; root pushes will be refused");
    }
    let key = chain.admin_private_key.as_deref();

    for entry in &config.mint_gates {
        let gate = EthereumMintGate::new(&chain.rpc_url, key, entry.address)
            .with_context(|| format!("campaign {}: cannot create mint gate", entry.campaign))?;
        info!(campaign = %entry.campaign, contract = %entry.address, "mint gate loaded");
        gates.insert(entry.campaign.clone(), gate);
    }

    for id in store.list().await.context("cannot list campaigns")? {
        if gates.contains_key(&id) {
            continue;
        }
        let Some(campaign) = store.get(&id).await? else {
            continue;
        };
        if let Some(contract) = campaign.contract_address {
            let gate = EthereumMintGate::new(&chain.rpc_url, key, contract)
                .with_context(|| format!("campaign {id}: cannot create mint gate"))?;
            info!(campaign = %id, %contract, "mint gate loaded from campaign record");
            gates.insert(id, gate);
        }
    }

    Ok(gates)
}
