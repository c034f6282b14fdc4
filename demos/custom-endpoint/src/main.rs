//! Custom Endpoint Demo
//!
//! Boots a Portico instance with two plugins registered on top of the
//! built-ins: a greeting endpoint mounted under `/greet/` and a bearer-token
//! auth provider guarding it. The instance configuration is written to a
//! scratch working directory on startup, so the demo is self-contained.
//!
//! Try it:
//!
//! ```text
//! cargo run -p demo-custom-endpoint
//! curl http://127.0.0.1:8080/status/
//! curl -H 'Authorization: Bearer demo-secret' http://127.0.0.1:8080/greet/world
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::info;

use portico::prelude::*;

// =============================================================================
// Greeting endpoint
// =============================================================================

/// Endpoint answering `GET {base}/{name}` with a JSON greeting.
///
/// The greeting word comes from the endpoint's `greeting` option and
/// defaults to "Hello".
#[derive(Debug)]
struct GreetingEndpoint;

impl GreetingEndpoint {
    const TYPE_ID: &'static str = "demo.GreetingEndpoint";
}

impl Endpoint for GreetingEndpoint {
    fn default_config(&self) -> EndpointConfig {
        let mut config = EndpointConfig::new(Self::TYPE_ID);
        config.base_path = Some("/greet/".to_owned());
        config.enabled = Some(true);
        config
    }

    fn create_endpoint_router(
        &self,
        _runtime: &RuntimeHandle,
        _base_path: &str,
        config: &EndpointConfig,
    ) -> Result<EndpointRouter, PluginError> {
        let greeting = config
            .additional
            .get("greeting")
            .and_then(Value::as_str)
            .unwrap_or("Hello")
            .to_owned();

        Ok(EndpointRouter::new(move |ctx, _request| {
            let name = ctx
                .route_path()
                .map(|path| path.trim_matches('/'))
                .filter(|name| !name.is_empty())
                .unwrap_or("stranger")
                .to_owned();
            let correlation_id = ctx.correlation_id().map(str::to_owned);
            let greeting = greeting.clone();

            Box::pin(async move {
                let body = json!({
                    "message": format!("{greeting}, {name}!"),
                    "correlation_id": correlation_id,
                });
                Ok(Response::json(StatusCode::OK, &body))
            })
        }))
    }
}

// =============================================================================
// Bearer-token auth provider
// =============================================================================

/// Auth provider producing authenticators that check a static bearer token.
///
/// The expected token comes from the chain entry's `token` option.
#[derive(Debug)]
struct BearerTokenProvider;

impl BearerTokenProvider {
    const TYPE_ID: &'static str = "demo.BearerToken";
}

impl AuthProvider for BearerTokenProvider {
    fn create_auth_handler(
        &self,
        _runtime: &RuntimeHandle,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn Authenticator>, PluginError> {
        let token = options
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::new("bearer-token handler needs a 'token' option"))?;

        Ok(Arc::new(BearerTokenAuthenticator {
            expected: format!("Bearer {token}"),
        }))
    }
}

struct BearerTokenAuthenticator {
    expected: String,
}

impl Authenticator for BearerTokenAuthenticator {
    fn name(&self) -> &str {
        "bearer-token"
    }

    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<(), AuthError>> {
        Box::pin(async move {
            let header = request
                .headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());

            match header {
                None => Err(AuthError::missing_credentials()),
                Some(value) if value == self.expected => Ok(()),
                Some(_) => Err(AuthError::invalid_credentials("token mismatch")),
            }
        })
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Instance configuration written to the scratch working directory.
const CONFIG: &str = r#"
host = "127.0.0.1"
port = 8080

[[endpoints]]
type = "portico.StatusEndpoint"

[[endpoints]]
type = "demo.GreetingEndpoint"
base_path = "/greet/"
greeting = "Ahoy"
auth_chain = [{ type = "demo.BearerToken", options = { token = "demo-secret" } }]
"#;

fn prepare_working_directory() -> std::io::Result<PathBuf> {
    let working_directory = std::env::temp_dir().join("portico-custom-endpoint-demo");
    let config_directory = working_directory.join("config");
    std::fs::create_dir_all(&config_directory)?;
    std::fs::write(config_directory.join("portico.toml"), CONFIG)?;
    Ok(working_directory)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut registry = PluginRegistry::with_builtins();
    registry
        .register_endpoint(GreetingEndpoint::TYPE_ID, || Ok(GreetingEndpoint))
        .register_auth_provider(BearerTokenProvider::TYPE_ID, || Ok(BearerTokenProvider));

    let mut options = PorticoOptions::default();
    options.instance_name = "greeting-demo".to_owned();
    options.working_directory = prepare_working_directory()?;

    let mut portico = Portico::builder(options).with_registry(registry).start().await?;

    info!(addr = %portico.server().local_addr(), "demo is up");
    info!("try: curl -H 'Authorization: Bearer demo-secret' http://127.0.0.1:8080/greet/world");

    tokio::signal::ctrl_c().await?;
    portico.stop().await?;
    Ok(())
}
