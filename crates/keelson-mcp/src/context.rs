//! Server-wide context: the entity store, workflow engine, and vault
//! exporter, wired up once from environment variables at startup.

use keelson::export::{ExportQueue, VaultExporter};
use keelson::store::SledStore;
use keelson::workflow::{WorkflowEngine, WorkflowIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Default database location, used when `DATABASE_PATH` is unset.
const DEFAULT_DATABASE_PATH: &str = ".keelson/keelson.db";
/// Default vault location, used when `MD_VAULT_PATH` is unset.
const DEFAULT_VAULT_PATH: &str = ".keelson/vault";
/// Workflow config file name looked up under `AGENT_CONFIG_DIR`.
const WORKFLOW_CONFIG_FILE: &str = "status-workflow.yaml";

/// Everything a tool call needs: the store, the compiled workflow engine,
/// and the export queue producer handle.
pub struct AppContext {
    /// The entity store.
    pub store: Arc<SledStore>,
    /// The workflow engine.
    pub workflow: Arc<WorkflowEngine>,
    /// The vault exporter, used directly by `rebuild_vault`.
    pub exporter: Arc<VaultExporter>,
    /// Producer handle for the export decorator queue.
    pub export_queue: ExportQueue,
}

impl AppContext {
    /// Build the context from the environment:
    /// - `DATABASE_PATH`: sled database directory (default `.keelson/keelson.db`)
    /// - `MD_VAULT_PATH`: exported Markdown vault root (default `.keelson/vault`)
    /// - `AGENT_CONFIG_DIR`: directory containing `status-workflow.yaml`; a
    ///   permissive built-in workflow is used if unset or the file is absent
    /// - `USE_FLYWAY`: reserved for a future migration runner; logged but
    ///   otherwise inert, since the store self-migrates on open
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub async fn from_env() -> keelson::error::Result<Self> {
        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH));
        let vault_path = std::env::var("MD_VAULT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_VAULT_PATH));

        if std::env::var("USE_FLYWAY").is_ok() {
            info!("USE_FLYWAY set; keelson self-migrates its sled schema on open, no action needed");
        }

        info!(path = %database_path.display(), "opening entity store");
        let store = Arc::new(SledStore::open(&database_path)?);

        let index = match std::env::var("AGENT_CONFIG_DIR") {
            Ok(dir) => {
                let config_path = PathBuf::from(dir).join(WORKFLOW_CONFIG_FILE);
                match keelson::workflow::WorkflowConfig::load(&config_path) {
                    Ok(config) => {
                        info!(path = %config_path.display(), "loaded status workflow configuration");
                        WorkflowIndex::compile(&config)
                    }
                    Err(err) => {
                        warn!(path = %config_path.display(), %err, "falling back to the permissive default workflow");
                        WorkflowIndex::permissive_default()
                    }
                }
            }
            Err(_) => {
                warn!("AGENT_CONFIG_DIR unset, using the permissive default workflow");
                WorkflowIndex::permissive_default()
            }
        };
        let workflow = Arc::new(WorkflowEngine::new(index));

        let exporter = Arc::new(VaultExporter::open(store.clone(), workflow.clone(), vault_path).await);
        let (export_queue, consumer) = exporter.clone().spawn_consumer();
        tokio::spawn(consumer);

        Ok(Self { store, workflow, exporter, export_queue })
    }
}
