//! Wires the configured store, provider, tools, assistant and scheduler.

use remindly_agent::{Assistant, Orchestrator};
use remindly_channels::ConsoleTransport;
use remindly_config::{AppConfig, StoreBackend};
use remindly_core::channel::Transport;
use remindly_core::locks::UserLocks;
use remindly_core::provider::Provider;
use remindly_core::store::Store;
use remindly_scheduler::Scheduler;
use remindly_store::{FileStore, InMemoryStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const REPLY_PREFIX: &str = "  Remindly > ";

pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn build_store(config: &AppConfig) -> Arc<dyn Store> {
    match config.store.backend {
        StoreBackend::File => Arc::new(FileStore::new(&config.store.path)),
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
    }
}

pub fn build_provider(config: &AppConfig) -> CliResult<Arc<dyn Provider>> {
    let router = remindly_providers::build_from_config(config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    Ok(provider)
}

/// Fail early with setup instructions when no key is available.
pub fn require_api_key(config: &AppConfig, config_path: Option<&Path>) -> CliResult<()> {
    if config.has_api_key() || config.providers.values().any(|p| p.api_key.is_some()) {
        return Ok(());
    }

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    REMINDLY_API_KEY    (generic)");
    eprintln!("    OPENROUTER_API_KEY  (OpenRouter)");
    eprintln!("    OPENAI_API_KEY      (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add api_key to {}", path.display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Everything a running assistant needs, sharing one store and one lock map.
pub struct Runtime {
    pub config: AppConfig,
    pub console: Arc<ConsoleTransport>,
    pub assistant: Arc<Assistant>,
    pub scheduler: Arc<Scheduler>,
}

impl Runtime {
    pub fn build(config: AppConfig) -> CliResult<Self> {
        let store = build_store(&config);
        let provider = build_provider(&config)?;
        let console = Arc::new(ConsoleTransport::stdout(REPLY_PREFIX));
        Ok(Self::assemble(config, store, provider, console))
    }

    /// Assemble around explicit collaborators.
    pub fn assemble(
        config: AppConfig,
        store: Arc<dyn Store>,
        provider: Arc<dyn Provider>,
        console: Arc<ConsoleTransport>,
    ) -> Self {
        let cadence = config.cadence.policy();
        let mut registry = remindly_tools::default_registry(store.clone(), cadence);
        remindly_tools::register_lookups(&mut registry, &config.lookups);
        debug!(tools = ?registry.names(), provider = provider.name(), "Runtime assembled");

        let locks = UserLocks::new();
        let orchestrator = Orchestrator::from_config(provider, Arc::new(registry), &config);
        let transport: Arc<dyn Transport> = console.clone();
        let assistant = Arc::new(
            Assistant::new(store.clone(), transport, orchestrator, config.agent.clone())
                .with_locks(locks.clone()),
        );
        let scheduler = Arc::new(Scheduler::from_config(
            store,
            assistant.clone(),
            locks,
            &config,
        ));

        Self {
            config,
            console,
            assistant,
            scheduler,
        }
    }
}
