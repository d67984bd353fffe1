//! Test server harness for end-to-end testing
//!
//! Provides `TestBrokerServer` for spawning the demo server against a
//! [`MockXsuaa`].

use crate::mock_xsuaa::MockXsuaa;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use xsuaa_broker::broker::TokenBroker;
use xsuaa_broker::config::Config;
use xsuaa_broker::observability::metrics::init_metrics_recorder;
use xsuaa_broker::routes::{self, AppState};

/// The global recorder can only be installed once per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics handle shared by every test server in the process.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the broker's demo server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let xsuaa = MockXsuaa::start().await;
/// let server = TestBrokerServer::spawn(&xsuaa, "oauth2,basic").await?;
///
/// let response = reqwest::get(format!("{}/v1/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestBrokerServer {
    addr: SocketAddr,
    config: Config,
    broker: Arc<TokenBroker>,
    _handle: JoinHandle<()>,
}

impl TestBrokerServer {
    /// Spawn a server bound to a random port, configured for `xsuaa`.
    ///
    /// `auth_methods` uses the `AUTH_METHODS` syntax, e.g. `"oauth2,basic"`.
    pub async fn spawn(xsuaa: &MockXsuaa, auth_methods: &str) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&xsuaa.config_vars(auth_methods))
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let broker = Arc::new(
            TokenBroker::from_config(&config)
                .map_err(|e| anyhow::anyhow!("Failed to create broker: {}", e))?,
        );

        let state = Arc::new(AppState {
            broker: broker.clone(),
        });

        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            broker,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The running broker, e.g. to swap its authentication configuration.
    pub fn broker(&self) -> &Arc<TokenBroker> {
        &self.broker
    }
}

impl Drop for TestBrokerServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
