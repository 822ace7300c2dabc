//! Test helper functions and utilities.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use wisp_api::{create_router_with, AppState};
use wisp_core::authority::UsageCounts;
use wisp_core::license::LicenseRecord;
use wisp_core::ports::{AuthorityApi, Clock, LicenseRepository, UsageProvider};
use wisp_licensing::{
    CommandChannel, HeartbeatService, LicenseService, LicensingConfig, MasterOverride,
    SuspensionCache, SuspensionGate, TamperGuard,
};

use crate::fixtures::{FixedClock, MemoryLicenseRepository, MockAuthority, StaticUsage};

/// Fully wired licensing subsystem on in-memory fixtures.
pub struct TestHarness {
    pub repo: Arc<MemoryLicenseRepository>,
    pub authority: Arc<MockAuthority>,
    pub clock: Arc<FixedClock>,
    pub cache: Arc<SuspensionCache>,
    pub guard: TamperGuard,
    pub heartbeat: Arc<HeartbeatService>,
    pub commands: Arc<CommandChannel>,
    pub service: Arc<LicenseService>,
    pub gate: Arc<SuspensionGate>,
}

impl TestHarness {
    /// Build a harness, optionally seeded with a license record.
    pub fn new(record: Option<LicenseRecord>) -> Self {
        let config = LicensingConfig::default();
        let repo = Arc::new(match record {
            Some(record) => MemoryLicenseRepository::with_record(record),
            None => MemoryLicenseRepository::new(),
        });
        let authority = Arc::new(MockAuthority::new());
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let cache = Arc::new(SuspensionCache::new(config.gate_ttl_secs));
        let guard = TamperGuard::new(config.offline_grace_days);

        let repo_dyn: Arc<dyn LicenseRepository> = repo.clone();
        let authority_dyn: Arc<dyn AuthorityApi> = authority.clone();
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let usage: Arc<dyn UsageProvider> = Arc::new(StaticUsage(UsageCounts {
            clients: 42,
            users: 3,
            plugins: 2,
        }));

        let heartbeat = Arc::new(HeartbeatService::new(
            repo_dyn.clone(),
            authority_dyn.clone(),
            usage,
            clock_dyn.clone(),
            guard,
            cache.clone(),
        ));
        let commands = Arc::new(CommandChannel::new(
            repo_dyn.clone(),
            authority_dyn.clone(),
            heartbeat.clone(),
            cache.clone(),
        ));
        let service = Arc::new(LicenseService::new(
            repo_dyn.clone(),
            authority_dyn,
            clock_dyn.clone(),
            guard,
            Arc::new(MasterOverride::new()),
            cache.clone(),
            heartbeat.clone(),
        ));
        let gate = Arc::new(SuspensionGate::new(
            repo_dyn,
            guard,
            clock_dyn,
            cache.clone(),
            config.exempt_path_prefixes.clone(),
        ));

        Self {
            repo,
            authority,
            clock,
            cache,
            guard,
            heartbeat,
            commands,
            service,
            gate,
        }
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(self.service.clone(), self.gate.clone()))
    }
}

/// Stub platform CRUD routes placed behind the suspension gate, standing in
/// for the surrounding application.
fn platform_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/clients",
            get(|| async { Json(serde_json::json!({ "clients": [], "total": 0 })) }).post(
                || async {
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({ "success": true })),
                    )
                },
            ),
        )
        .route(
            "/api/payments",
            post(|| async {
                (
                    StatusCode::CREATED,
                    Json(serde_json::json!({ "success": true })),
                )
            }),
        )
}

/// Start an API server for testing and return its address.
pub async fn start_test_server(
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let app = create_router_with(state, platform_routes());
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    Ok((addr, handle))
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// API test client with base URL.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).json(body).send().await
    }
}
