//! Merkle Allowlist Demo
//!
//! Walks through a campaign's life in-process: list edits, root pushes,
//! mints against a mock gate, and drift detection. No chain or disk
//! access.
//!
//! Run with: `cargo run --bin demo`

use std::collections::HashMap;
use std::sync::Arc;

use pop_allowlist::adapters::memory_store::InMemoryCampaignStore;
use pop_allowlist::adapters::mock_mint_gate::MockMintGate;
use pop_allowlist::domain::campaign::NewCampaign;
use pop_allowlist::domain::identity::Identity;
use pop_allowlist::domain::merkle::{EligibilityTree, verify_proof};
use pop_allowlist::error::EligibilityError;
use pop_allowlist::registry::EligibilityRegistry;
use pop_allowlist::sync::RootSync;

type DemoSync = RootSync<InMemoryCampaignStore, MockMintGate>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    println!("=== Proof-of-Participation Merkle Allowlist ===\n");

    scenario_membership_change()?;
    println!("\n{}\n", "=".repeat(60));
    scenario_campaign_lifecycle().await?;
    println!("\n{}\n", "=".repeat(60));
    scenario_store_drift().await?;

    println!("\n=== All scenarios completed successfully ===");
    Ok(())
}

fn short(hash: impl std::fmt::Display) -> String {
    let s = hash.to_string();
    format!("{}...", &s[..18.min(s.len())])
}

fn scenario_membership_change() -> anyhow::Result<()> {
    println!("--- Scenario 1: Removing one identity invalidates everyone's proof ---\n");

    let list: Vec<Identity> = ["a@x.com", "b@x.com", "c@x.com"]
        .iter()
        .map(|raw| Identity::parse(raw))
        .collect::<Result<_, _>>()?;
    let tree = EligibilityTree::from_identities(&list)?;
    let root = tree.root();
    println!("[List] a@x.com, b@x.com, c@x.com");
    println!("  root R: {}", short(root));

    let b = &list[1];
    let proof_b = tree
        .prove(b.leaf())
        .ok_or_else(|| anyhow::anyhow!("b@x.com missing from its own tree"))?;
    println!("  proof for b@x.com: {} siblings", proof_b.path.len());
    println!("  verifies against R: {}", proof_b.verify(root));

    println!("\n[Edit] removing c@x.com...");
    let trimmed = EligibilityTree::from_identities(&list[..2])?;
    let new_root = trimmed.root();
    println!("  root R': {}", short(new_root));
    println!("  R' != R: {}", new_root != root);
    println!(
        "  old proof for b@x.com verifies against R': {}",
        verify_proof(proof_b.leaf, &proof_b.path, new_root)
    );
    println!(
        "  c@x.com has a proof in the new tree: {}",
        trimmed.contains(list[2].leaf())
    );

    println!("\n[Normalize] \"  Foo@Bar.COM \" and \"foo@bar.com\"");
    let messy = Identity::parse("  Foo@Bar.COM ")?;
    let clean = Identity::parse("foo@bar.com")?;
    println!("  same leaf: {}", messy.leaf() == clean.leaf());
    Ok(())
}

async fn setup(ids: &[&str]) -> anyhow::Result<DemoSync> {
    let registry = Arc::new(EligibilityRegistry::new(InMemoryCampaignStore::new()));
    registry
        .create_campaign(
            NewCampaign {
                id: "devcon-pop".into(),
                name: "Devcon POP".into(),
                network: "sepolia".into(),
                max_supply: Some(500),
                ..Default::default()
            },
            ids,
        )
        .await?;
    let mut gates = HashMap::new();
    gates.insert("devcon-pop".to_string(), MockMintGate::new());
    Ok(RootSync::new(registry, gates))
}

async fn scenario_campaign_lifecycle() -> anyhow::Result<()> {
    println!("--- Scenario 2: Push, mint, and lock ---\n");

    let sync = setup(&["alice@eth.org", "bob@eth.org", "carol@eth.org"]).await?;
    let status = sync.chain_status("devcon-pop").await?;
    println!("[Setup] campaign created with 3 identities");
    println!("  stored root: {:?}", status.stored_root.map(short));
    println!("  gate root:   {}", short(status.chain_root));

    println!("\n[Mint] before pushing the root...");
    match sync.prepare_mint("devcon-pop", "alice@eth.org").await {
        Err(e @ EligibilityError::ChainDrift { .. }) => println!("  refused: {e}"),
        other => anyhow::bail!("expected chain drift, got {other:?}"),
    }

    println!("\n[Sync] pushing the stored root...");
    let outcome = sync.push_root("devcon-pop").await?;
    println!("  {outcome:?}");

    println!("\n[Mint] alice@eth.org");
    let receipt = sync.mint("devcon-pop", "alice@eth.org").await?;
    println!("  tx: {}", short(receipt.tx_hash));

    println!("\n[Mint] alice@eth.org again");
    match sync.mint("devcon-pop", "alice@eth.org").await {
        Err(e @ EligibilityError::AlreadyConsumed(_)) => println!("  refused: {e}"),
        other => anyhow::bail!("expected already consumed, got {other:?}"),
    }

    println!("\n[Edit] adding dave@eth.org after minting started");
    match sync.add_identities("devcon-pop", ["dave@eth.org"]).await {
        Err(e @ EligibilityError::CampaignLocked { .. }) => println!("  refused: {e}"),
        other => anyhow::bail!("expected a locked campaign, got {other:?}"),
    }

    println!("\n[Diagnose] mallory@eth.org");
    let diagnosis = sync.diagnose("devcon-pop", "mallory@eth.org").await?;
    println!("  in list: {}", diagnosis.in_list);
    if let Err(e) = diagnosis.verdict() {
        println!("  verdict: {e}");
    }
    Ok(())
}

async fn scenario_store_drift() -> anyhow::Result<()> {
    println!("--- Scenario 3: Out-of-band store edit ---\n");

    let sync = setup(&["alice@eth.org", "bob@eth.org"]).await?;
    sync.push_root("devcon-pop").await?;

    println!("[Tamper] appending erin@eth.org to the stored list without a recompute");
    let mut record = sync.registry().campaign("devcon-pop").await?;
    record.eligible_identities.push("erin@eth.org".into());
    sync.registry().store().force_put(record).await;

    let report = sync.registry().check_consistency("devcon-pop").await?;
    println!("  root consistent: {}", report.root_consistent);
    println!("  missing proofs:  {:?}", report.missing_proofs);

    println!("\n[Sync] pushing the drifted root...");
    match sync.push_root("devcon-pop").await {
        Err(e @ EligibilityError::RootDrift { .. }) => println!("  refused: {e}"),
        other => anyhow::bail!("expected root drift, got {other:?}"),
    }

    println!("\n[Diagnose] erin@eth.org");
    let diagnosis = sync.diagnose("devcon-pop", "erin@eth.org").await?;
    println!(
        "  in list: {}  proof present: {}  root consistent: {}",
        diagnosis.in_list, diagnosis.proof_present, diagnosis.root_consistent
    );
    if let Err(e) = diagnosis.verdict() {
        println!("  verdict: {e}");
    }

    println!("\n[Repair] re-setting the list recomputes root and proofs");
    let identities = ["alice@eth.org", "bob@eth.org", "erin@eth.org"];
    let snapshot = sync.set_identities("devcon-pop", identities).await?;
    println!("  new root: {}", short(snapshot.merkle_root));
    println!(
        "  consistent: {}",
        sync.registry().check_consistency("devcon-pop").await?.is_consistent()
    );
    Ok(())
}
