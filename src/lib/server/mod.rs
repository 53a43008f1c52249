pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::ports::mint_gate::MintGate;
use crate::ports::store::CampaignStore;
use crate::sync::RootSync;

use self::routes::{
    AppState, add_identities_handler, campaign_handler, chain_status_handler, close_handler,
    consistency_handler, create_handler, delete_handler, diagnose_handler, list_handler,
    proof_handler, remove_identities_handler, set_identities_handler, sync_handler,
};

/// Admin and proof-lookup routes over a `RootSync`.
pub fn router<S, G>(sync: Arc<RootSync<S, G>>) -> Router
where
    S: CampaignStore + 'static,
    G: MintGate + 'static,
{
    let state = AppState { sync };
    Router::new()
        .route(
            "/campaigns",
            get(list_handler::<S, G>).post(create_handler::<S, G>),
        )
        .route(
            "/campaigns/{id}",
            get(campaign_handler::<S, G>).delete(delete_handler::<S, G>),
        )
        .route(
            "/campaigns/{id}/identities",
            axum::routing::put(set_identities_handler::<S, G>)
                .post(add_identities_handler::<S, G>)
                .delete(remove_identities_handler::<S, G>),
        )
        .route(
            "/campaigns/{id}/proof/{identity}",
            get(proof_handler::<S, G>),
        )
        .route(
            "/campaigns/{id}/diagnose/{identity}",
            get(diagnose_handler::<S, G>),
        )
        .route(
            "/campaigns/{id}/consistency",
            get(consistency_handler::<S, G>),
        )
        .route("/campaigns/{id}/chain", get(chain_status_handler::<S, G>))
        .route("/campaigns/{id}/sync", post(sync_handler::<S, G>))
        .route("/campaigns/{id}/close", post(close_handler::<S, G>))
        .with_state(state)
}

/// Running server. Dropping it leaves the server running; call
/// [`ServerHandle::shutdown`] to stop it gracefully.
pub struct ServerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub async fn shutdown(self) -> Result<(), ServerError> {
        // Receiver gone means the server already stopped.
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| ServerError::Join(e.to_string()))?
            .map_err(ServerError::Serve)
    }
}

/// Bind `addr` and serve the router in a background task.
///
/// Returns the handle for graceful shutdown and the bound address (useful
/// with port 0).
pub async fn start_server<S, G>(
    sync: Arc<RootSync<S, G>>,
    addr: SocketAddr,
) -> Result<(ServerHandle, SocketAddr), ServerError>
where
    S: CampaignStore + 'static,
    G: MintGate + 'static,
{
    let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
    let bound_addr = listener.local_addr().map_err(ServerError::Bind)?;
    let app = router(sync);

    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await
    });

    info!(%bound_addr, "HTTP server listening");
    Ok((ServerHandle { shutdown: tx, task }, bound_addr))
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot bind listener: {0}")]
    Bind(std::io::Error),

    #[error("server failed: {0}")]
    Serve(std::io::Error),

    #[error("server task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryCampaignStore;
    use crate::adapters::mock_mint_gate::MockMintGate;
    use crate::diagnostics::Diagnosis;
    use crate::domain::campaign::{Campaign, EligibilitySnapshot};
    use crate::domain::merkle::verify_proof;
    use crate::ports::MintRequest;
    use crate::registry::EligibilityRegistry;
    use std::collections::HashMap;

    type TestSync = RootSync<InMemoryCampaignStore, MockMintGate>;

    async fn spawn(with_gate: bool) -> (ServerHandle, String, Arc<TestSync>) {
        let registry = Arc::new(EligibilityRegistry::new(InMemoryCampaignStore::new()));
        let mut gates = HashMap::new();
        if with_gate {
            gates.insert("pop".to_string(), MockMintGate::new());
        }
        let sync = Arc::new(RootSync::new(registry, gates));
        let (handle, bound) = start_server(sync.clone(), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");
        (handle, format!("http://127.0.0.1:{}", bound.port()), sync)
    }

    #[tokio::test]
    async fn test_campaign_lifecycle_over_http() {
        let (handle, base_url, _sync) = spawn(true).await;
        let client = reqwest::Client::new();

        // ── Create with a seed list ──
        let resp = client
            .post(format!("{base_url}/campaigns"))
            .json(&serde_json::json!({
                "id": "pop",
                "name": "Devcon POP",
                "network": "sepolia",
                "identities": ["a@x.com", "b@x.com", "c@x.com"]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let created: Campaign = resp.json().await.unwrap();
        let root = created.merkle_root.unwrap();

        // ── Proof before the root is pushed: chain drift ──
        let resp = client
            .get(format!("{base_url}/campaigns/pop/proof/b@x.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        // ── Push, then the proof verifies ──
        let resp = client
            .post(format!("{base_url}/campaigns/pop/sync"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "pushed");

        let resp = client
            .get(format!("{base_url}/campaigns/pop/proof/B@X.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let request: MintRequest = resp.json().await.unwrap();
        assert!(verify_proof(request.leaf_hash, &request.proof, root));

        // ── Unlisted identity ──
        let resp = client
            .get(format!("{base_url}/campaigns/pop/proof/z@x.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        // ── Remove c: new root, diagnosis shows the gate lagging ──
        let resp = client
            .delete(format!("{base_url}/campaigns/pop/identities"))
            .json(&serde_json::json!({ "identities": ["c@x.com"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let snapshot: EligibilitySnapshot = resp.json().await.unwrap();
        assert_ne!(snapshot.merkle_root, root);
        assert!(!snapshot.merkle_proofs.contains_key("c@x.com"));

        let resp = client
            .get(format!("{base_url}/campaigns/pop/diagnose/b@x.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let diagnosis: Diagnosis = resp.json().await.unwrap();
        assert!(diagnosis.in_list && diagnosis.proof_verifies && diagnosis.root_consistent);
        assert_eq!(diagnosis.chain_root_matches, Some(false));

        // ── Consistency ──
        let resp = client
            .get(format!("{base_url}/campaigns/pop/consistency"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let report: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(report["rootConsistent"], true);

        // ── Close, then edits are refused ──
        let resp = client
            .post(format!("{base_url}/campaigns/pop/close"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .post(format!("{base_url}/campaigns/pop/identities"))
            .json(&serde_json::json!({ "list": "d@x.com" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_campaign_and_errors() {
        let (handle, base_url, _sync) = spawn(false).await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base_url}/campaigns/missing"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("missing"));

        let resp = client
            .post(format!("{base_url}/campaigns"))
            .json(&serde_json::json!({
                "id": "pop",
                "name": "POP",
                "network": "sepolia",
                "list": "a@x.com\nnot-an-email"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{base_url}/campaigns"))
            .json(&serde_json::json!({
                "id": "pop",
                "name": "POP",
                "network": "sepolia",
                "list": "a@x.com\nb@x.com"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        // Without a gate the proof comes straight from the store.
        let resp = client
            .get(format!("{base_url}/campaigns/pop/proof/a@x.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .post(format!("{base_url}/campaigns/pop/sync"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let ids: Vec<String> = client
            .get(format!("{base_url}/campaigns"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ids, vec!["pop"]);

        let resp = client
            .delete(format!("{base_url}/campaigns/pop"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);

        handle.shutdown().await.unwrap();
    }
}
