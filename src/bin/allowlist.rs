//! Campaign allowlist administration CLI.
//!
//! Offline commands (`root`, `prove`, `verify`) work on a plain list file.
//! Campaign commands operate on the JSON file store under `--data-dir` and,
//! when `--rpc-url` is given and the campaign has a contract address, on the
//! campaign's mint gate.
//!
//! Run with: `cargo run --bin allowlist -- --help`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use pop_allowlist::adapters::ethereum::EthereumMintGate;
use pop_allowlist::adapters::file_store::FileCampaignStore;
use pop_allowlist::domain::campaign::NewCampaign;
use pop_allowlist::domain::identity::{Identity, parse_identity_list};
use pop_allowlist::domain::merkle::{EligibilityTree, verify_proof};
use pop_allowlist::ports::MintRequest;
use pop_allowlist::registry::EligibilityRegistry;
use pop_allowlist::sync::RootSync;

type CampaignSync = RootSync<FileCampaignStore, EthereumMintGate>;

#[derive(Parser)]
#[command(name = "allowlist")]
#[command(about = "Merkle allowlist administration for proof-of-participation campaigns", long_about = None)]
struct Cli {
    /// Directory holding one JSON record per campaign
    #[arg(long, env = "ALLOWLIST_DATA_DIR", default_value = "data/campaigns")]
    data_dir: PathBuf,

    /// JSON-RPC endpoint of the mint gate's chain
    #[arg(long, env = "ALLOWLIST_RPC_URL")]
    rpc_url: Option<String>,

    /// Owner key of the mint gate (needed for `sync`)
    #[arg(long, env = "ALLOWLIST_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Upper bound for a single chain call, in seconds
    #[arg(long, default_value_t = 120)]
    call_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Identities given inline, from a list file, or both.
#[derive(Args)]
struct IdentityInput {
    /// Newline, comma or semicolon separated list file
    #[arg(long)]
    file: Option<PathBuf>,

    identities: Vec<String>,
}

impl IdentityInput {
    fn load(&self) -> anyhow::Result<Vec<String>> {
        let mut raw = self.identities.clone();
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let parsed = parse_identity_list(&text)?;
            raw.extend(parsed.into_iter().map(|i| i.as_str().to_string()));
        }
        Ok(raw)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the root of a list without touching the store
    Root {
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Print the mint request for one identity of a list
    Prove {
        #[arg(long)]
        identity: String,
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Verify a proof against a root
    Verify {
        #[arg(long)]
        root: B256,
        #[arg(long)]
        identity: String,
        /// Comma separated sibling hashes, leaf to root
        #[arg(long, value_delimiter = ',')]
        proof: Vec<B256>,
    },

    /// Create a campaign, optionally seeded with identities
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "sepolia")]
        network: String,
        #[arg(long)]
        max_supply: Option<u64>,
        /// Deployed mint gate contract
        #[arg(long)]
        contract: Option<Address>,
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Replace the eligible set
    Set {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Add identities
    Add {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Remove identities
    Remove {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        input: IdentityInput,
    },

    /// Check the stored root and proofs against the stored list
    Check {
        #[arg(long)]
        id: String,
    },

    /// Explain why an identity can or cannot mint
    Diagnose {
        #[arg(long)]
        id: String,
        #[arg(long)]
        identity: String,
    },

    /// Push the stored root to the mint gate
    Sync {
        #[arg(long)]
        id: String,
    },

    /// Freeze identity edits
    Close {
        #[arg(long)]
        id: String,
    },

    /// Delete a campaign that has never been pushed
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Root { input } => {
            let identities = input.load()?;
            let tree = build_tree(&identities)?;
            println!("root:       {}", tree.root());
            println!("leaves:     {}", tree.len());
            println!("duplicates: {}", tree.duplicates());
            println!("depth:      {}", tree.depth());
        }
        Commands::Prove { identity, input } => {
            let identities = input.load()?;
            let tree = build_tree(&identities)?;
            let identity = Identity::parse(identity)?;
            let Some(proof) = tree.prove(identity.leaf()) else {
                bail!("{identity} is not in the list");
            };
            print_json(&MintRequest {
                leaf_hash: proof.leaf,
                proof: proof.path,
            })?;
        }
        Commands::Verify {
            root,
            identity,
            proof,
        } => {
            let identity = Identity::parse(identity)?;
            if !verify_proof(identity.leaf(), proof, *root) {
                bail!("proof for {identity} does not verify against {root}");
            }
            println!("valid");
        }
        Commands::Create {
            id,
            name,
            network,
            max_supply,
            contract,
            input,
        } => {
            let registry = open_registry(&cli).await?;
            let campaign = registry
                .create_campaign(
                    NewCampaign {
                        id: id.clone(),
                        name: name.clone(),
                        network: network.clone(),
                        max_supply: *max_supply,
                        contract_address: *contract,
                    },
                    input.load()?,
                )
                .await?;
            print_json(&campaign)?;
        }
        Commands::Set { id, input } => {
            let sync = open_sync(&cli, id).await?;
            print_json(&sync.set_identities(id, input.load()?).await?)?;
        }
        Commands::Add { id, input } => {
            let sync = open_sync(&cli, id).await?;
            print_json(&sync.add_identities(id, input.load()?).await?)?;
        }
        Commands::Remove { id, input } => {
            let sync = open_sync(&cli, id).await?;
            print_json(&sync.remove_identities(id, input.load()?).await?)?;
        }
        Commands::Check { id } => {
            let registry = open_registry(&cli).await?;
            let report = registry.check_consistency(id).await?;
            print_json(&report)?;
            report.into_result()?;
        }
        Commands::Diagnose { id, identity } => {
            let sync = open_sync(&cli, id).await?;
            let diagnosis = sync.diagnose(id, identity).await?;
            print_json(&diagnosis)?;
            diagnosis.verdict()?;
        }
        Commands::Sync { id } => {
            let sync = open_sync(&cli, id).await?;
            print_json(&sync.push_root(id).await?)?;
        }
        Commands::Close { id } => {
            let registry = open_registry(&cli).await?;
            print_json(&registry.close_campaign(id).await?)?;
        }
        Commands::Delete { id } => {
            let registry = open_registry(&cli).await?;
            registry.delete_campaign(id).await?;
            println!("deleted {id}");
        }
    }

    Ok(())
}

fn build_tree(raw: &[String]) -> anyhow::Result<EligibilityTree> {
    let identities = pop_allowlist::domain::identity::dedup_identities(raw)?;
    Ok(EligibilityTree::from_identities(&identities)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_registry(cli: &Cli) -> anyhow::Result<EligibilityRegistry<FileCampaignStore>> {
    let store = FileCampaignStore::open(&cli.data_dir)
        .await
        .with_context(|| format!("cannot open store at {}", cli.data_dir.display()))?;
    Ok(EligibilityRegistry::new(store))
}

/// Registry plus the campaign's mint gate when the chain is configured and
/// the campaign records a contract address.
async fn open_sync(cli: &Cli, id: &str) -> anyhow::Result<CampaignSync> {
    let registry = Arc::new(open_registry(cli).await?);
    let campaign = registry.campaign(id).await?;

    let mut gates = HashMap::new();
    match (&cli.rpc_url, campaign.contract_address) {
        (Some(rpc_url), Some(contract)) => {
            let gate = EthereumMintGate::new(rpc_url, cli.private_key.as_deref(), contract)?;
            info!(campaign = id, %contract, "mint gate connected");
            gates.insert(id.to_string(), gate);
        }
        (None, Some(contract)) => {
            info!(campaign = id, %contract, "no --rpc-url; working offline");
        }
        _ => {}
    }

    Ok(RootSync::new(registry, gates)
        .with_call_timeout(Duration::from_secs(cli.call_timeout_secs)))
}
