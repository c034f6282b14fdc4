//! Boot orchestration and process lifecycle.
//!
//! A boot attempt runs a fixed sequence of named steps against a shared
//! [`BootContext`]; the first failing step abandons the attempt. Runtime
//! ownership is decided once, when the supplier hands over the runtime:
//! owned runtimes are closed exactly once on boot failure and again on
//! explicit stop, external runtimes are never closed here. A close failure
//! during error handling is logged and never replaces the boot error.

use std::fmt;
use std::sync::Arc;

use portico_config::{ConfigLoader, ServerConfig};
use portico_core::{
    BootError, BoxFuture, OwnedRuntimeSupplier, PorticoOptions, RuntimeCloseError, RuntimeHandle,
    RuntimeSupplier,
};

use crate::assemble::RouteAssembler;
use crate::auth::{compose_auth_chain, ComposedAuthenticator};
use crate::hooks::{RequestHook, RequestHooks};
use crate::plugin::PluginRegistry;
use crate::router::RouterBuilder;
use crate::server::{HttpServer, ServerHandle};

/// Lifecycle phases of one Portico instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Boot has not begun.
    NotStarted,
    /// The shared runtime was obtained and tagged with its ownership.
    RuntimeObtained,
    /// The HTTP server is serving.
    Running,
    /// The instance was stopped explicitly.
    Stopped,
    /// A boot step failed and the attempt was abandoned.
    Failed,
}

/// Mutable state threaded through the boot steps.
struct BootContext {
    runtime: RuntimeHandle,
    options: PorticoOptions,
    registry: Arc<PluginRegistry>,
    hooks: RequestHooks,
    config: Option<ServerConfig>,
    assembler: Option<RouteAssembler>,
    builder: Option<RouterBuilder>,
    default_auth: Option<ComposedAuthenticator>,
    server: Option<ServerHandle>,
}

type StepFn = for<'a> fn(&'a mut BootContext) -> BoxFuture<'a, Result<(), BootError>>;

/// One named boot step.
struct BootStep {
    name: &'static str,
    run: StepFn,
}

/// The ordered steps of a boot attempt.
struct BootSequence {
    steps: Vec<BootStep>,
}

impl BootSequence {
    fn standard() -> Self {
        Self {
            steps: vec![
                BootStep {
                    name: "load-configuration",
                    run: load_configuration,
                },
                BootStep {
                    name: "create-router",
                    run: create_router,
                },
                BootStep {
                    name: "compose-auth-chain",
                    run: compose_default_auth,
                },
                BootStep {
                    name: "mount-endpoints",
                    run: mount_endpoints,
                },
                BootStep {
                    name: "start-server",
                    run: start_server,
                },
            ],
        }
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<(), BootError> {
        for step in &self.steps {
            tracing::debug!(step = step.name, "running boot step");
            if let Err(error) = (step.run)(ctx).await {
                tracing::error!(step = step.name, %error, "boot step failed");
                return Err(error);
            }
        }
        Ok(())
    }
}

fn load_configuration(ctx: &mut BootContext) -> BoxFuture<'_, Result<(), BootError>> {
    Box::pin(async move {
        let config_dir = ctx.options.config_directory();
        let loader = ConfigLoader::from_config_dir(&config_dir).map_err(BootError::config_load)?;
        if loader.file_loaded() {
            tracing::info!(dir = %config_dir.display(), "configuration loaded");
        } else {
            tracing::info!(dir = %config_dir.display(), "no configuration file found, using defaults");
        }

        let mut config = loader.load().map_err(BootError::config_load)?;
        if let Some(port) = ctx.options.server_port {
            tracing::debug!(port, "applying process-level port override");
            config.port = port;
        }

        ctx.config = Some(config);
        Ok(())
    })
}

fn create_router(ctx: &mut BootContext) -> BoxFuture<'_, Result<(), BootError>> {
    Box::pin(async move {
        let config = match ctx.config.clone() {
            Some(config) => config,
            None => return Err(BootError::other("create-router ran before load-configuration")),
        };

        let assembler = RouteAssembler::new(
            ctx.runtime.clone(),
            Arc::clone(&ctx.registry),
            config,
            ctx.options.instance_name.clone(),
        );
        let builder = assembler.create_router().await?;

        ctx.assembler = Some(assembler);
        ctx.builder = Some(builder);
        Ok(())
    })
}

fn compose_default_auth(ctx: &mut BootContext) -> BoxFuture<'_, Result<(), BootError>> {
    Box::pin(async move {
        let config = match ctx.config.as_ref() {
            Some(config) => config,
            None => {
                return Err(BootError::other(
                    "compose-auth-chain ran before load-configuration",
                ))
            }
        };

        ctx.default_auth =
            compose_auth_chain(config.auth_chain.as_deref(), &ctx.registry, &ctx.runtime)?;
        Ok(())
    })
}

fn mount_endpoints(ctx: &mut BootContext) -> BoxFuture<'_, Result<(), BootError>> {
    Box::pin(async move {
        let (assembler, builder) = match (&ctx.assembler, &mut ctx.builder) {
            (Some(assembler), Some(builder)) => (assembler, builder),
            _ => return Err(BootError::other("mount-endpoints ran before create-router")),
        };

        assembler.mount_endpoints(builder, ctx.default_auth.as_ref(), &ctx.hooks)
    })
}

fn start_server(ctx: &mut BootContext) -> BoxFuture<'_, Result<(), BootError>> {
    Box::pin(async move {
        let config = match ctx.config.as_ref() {
            Some(config) => config,
            None => return Err(BootError::other("start-server ran before load-configuration")),
        };
        let addr = config.socket_addr().map_err(BootError::config_load)?;

        let builder = match ctx.builder.take() {
            Some(builder) => builder,
            None => return Err(BootError::other("start-server ran before create-router")),
        };

        let server = HttpServer::start(builder.finish(), addr).await?;
        ctx.server = Some(server);
        Ok(())
    })
}

/// Closes the runtime after a failed boot, when this attempt owns it.
///
/// A close failure is logged and never replaces the boot error.
async fn close_after_failure(runtime: &RuntimeHandle) {
    if !runtime.ownership().is_owned() {
        return;
    }
    if let Err(close_error) = runtime.close().await {
        tracing::error!(%close_error, "failed to close runtime after boot failure");
    }
}

/// Configures and boots a Portico instance.
///
/// # Example
///
/// ```no_run
/// use portico_core::PorticoOptions;
/// use portico_server::Portico;
///
/// # async fn run() -> Result<(), portico_core::BootError> {
/// let mut options = PorticoOptions::default();
/// options.server_port = Some(8080);
///
/// let mut portico = Portico::builder(options).start().await?;
/// portico.stop().await.ok();
/// # Ok(())
/// # }
/// ```
pub struct PorticoBuilder {
    options: PorticoOptions,
    registry: Option<PluginRegistry>,
    hooks: RequestHooks,
}

impl PorticoBuilder {
    fn new(options: PorticoOptions) -> Self {
        Self {
            options,
            registry: None,
            hooks: RequestHooks::new(),
        }
    }

    /// Replaces the plugin registry used for every resolution in this boot.
    ///
    /// Without this, the built-in registry is used.
    #[must_use]
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the request hooks shared by every mounted endpoint.
    #[must_use]
    pub fn with_hooks(mut self, hooks: RequestHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Appends one request hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hooks.add(hook);
        self
    }

    /// Boots on a runtime this attempt creates and owns.
    pub async fn start(self) -> Result<Portico, BootError> {
        self.boot(&OwnedRuntimeSupplier::new()).await
    }

    /// Boots on the runtime produced by the given supplier.
    ///
    /// The supplier's ownership declaration decides who closes the runtime:
    /// owned runtimes are closed here on failure and on stop, external ones
    /// never are.
    pub async fn boot(self, supplier: &dyn RuntimeSupplier) -> Result<Portico, BootError> {
        let mut state = LifecycleState::NotStarted;
        tracing::trace!(state = ?state, "boot attempt starting");

        self.options.validate()?;

        let runtime = supplier.supply(&self.options).await?;
        let runtime = RuntimeHandle::new(runtime, supplier.ownership());
        state = LifecycleState::RuntimeObtained;
        tracing::debug!(
            state = ?state,
            ownership = ?runtime.ownership(),
            clustered = runtime.is_clustered(),
            "runtime obtained"
        );

        let registry = Arc::new(self.registry.unwrap_or_else(PluginRegistry::with_builtins));
        let mut ctx = BootContext {
            runtime: runtime.clone(),
            options: self.options,
            registry,
            hooks: self.hooks,
            config: None,
            assembler: None,
            builder: None,
            default_auth: None,
            server: None,
        };

        if let Err(error) = BootSequence::standard().run(&mut ctx).await {
            state = LifecycleState::Failed;
            tracing::error!(state = ?state, "boot abandoned");
            close_after_failure(&runtime).await;
            return Err(error);
        }

        let server = match ctx.server.take() {
            Some(server) => server,
            None => {
                state = LifecycleState::Failed;
                tracing::error!(state = ?state, "boot abandoned");
                close_after_failure(&runtime).await;
                return Err(BootError::other("boot sequence finished without a server"));
            }
        };

        state = LifecycleState::Running;
        tracing::info!(
            state = ?state,
            addr = %server.local_addr(),
            instance = %ctx.options.instance_name,
            "portico is running"
        );

        Ok(Portico {
            runtime,
            server,
            options: ctx.options,
            state,
        })
    }
}

/// A running Portico instance.
pub struct Portico {
    runtime: RuntimeHandle,
    server: ServerHandle,
    options: PorticoOptions,
    state: LifecycleState,
}

impl Portico {
    /// Starts building a boot attempt with the given options.
    #[must_use]
    pub fn builder(options: PorticoOptions) -> PorticoBuilder {
        PorticoBuilder::new(options)
    }

    /// Boots with built-in plugins on an owned runtime.
    pub async fn start(options: PorticoOptions) -> Result<Self, BootError> {
        Self::builder(options).start().await
    }

    /// Boots with built-in plugins on a supplied runtime.
    pub async fn boot(
        supplier: &dyn RuntimeSupplier,
        options: PorticoOptions,
    ) -> Result<Self, BootError> {
        Self::builder(options).boot(supplier).await
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the handle to the HTTP server.
    #[must_use]
    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    /// Returns the options this instance booted with.
    #[must_use]
    pub fn options(&self) -> &PorticoOptions {
        &self.options
    }

    /// Stops the HTTP server and, for owned runtimes, closes the runtime.
    ///
    /// Idempotent; repeated calls return `Ok` without doing work.
    pub async fn stop(&mut self) -> Result<(), RuntimeCloseError> {
        if self.state == LifecycleState::Stopped {
            return Ok(());
        }

        self.server.stop().await;

        let result = if self.runtime.ownership().is_owned() {
            self.runtime.close().await
        } else {
            Ok(())
        };

        self.state = LifecycleState::Stopped;
        tracing::info!("portico stopped");
        result
    }
}

impl fmt::Debug for Portico {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portico")
            .field("state", &self.state)
            .field("addr", &self.server.local_addr())
            .field("instance", &self.options.instance_name)
            .finish_non_exhaustive()
    }
}
