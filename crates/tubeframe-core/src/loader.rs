//! SDK Loader - one-time runtime installation
//!
//! The first call to [`SdkLoader::acquire`] starts loading the runtime; every
//! other caller, concurrent or later, shares that single attempt. The outcome
//! is cached for the lifetime of the loader, including failures: there is no
//! retry and no reset.

use crate::config::SdkConfig;
use crate::runtime::{RuntimeHandle, ScriptHost};
use crate::{Error, Result};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

static GLOBAL: OnceLock<Arc<SdkLoader>> = OnceLock::new();

/// Loads the player runtime at most once
pub struct SdkLoader {
    host: Arc<dyn ScriptHost>,
    config: SdkConfig,
    gate: OnceCell<Result<RuntimeHandle>>,
}

impl SdkLoader {
    /// Create a loader with its own gate
    pub fn new(host: Arc<dyn ScriptHost>, config: SdkConfig) -> Self {
        Self {
            host,
            config,
            gate: OnceCell::new(),
        }
    }

    /// Process-wide loader.
    ///
    /// The first caller installs it; later callers get the same loader and
    /// their arguments are ignored.
    pub fn global(host: Arc<dyn ScriptHost>, config: SdkConfig) -> Arc<SdkLoader> {
        GLOBAL
            .get_or_init(|| Arc::new(SdkLoader::new(host, config)))
            .clone()
    }

    /// Resolve the runtime, loading it on first use
    pub async fn acquire(&self) -> Result<RuntimeHandle> {
        self.gate.get_or_init(|| self.load()).await.clone()
    }

    /// Whether a load attempt has finished, successfully or not
    pub fn is_settled(&self) -> bool {
        self.gate.initialized()
    }

    #[instrument(skip(self), fields(script = %self.config.script_url))]
    async fn load(&self) -> Result<RuntimeHandle> {
        if self.host.runtime_present() {
            debug!("Runtime already installed, waiting for ready signal");
            return self.host.when_ready().await;
        }

        info!("Inserting runtime script");
        if let Err(e) = self.host.load_script(&self.config.script_url).await {
            warn!(error = %e, "Runtime script failed to load");
            return Err(match e {
                Error::SdkLoad(_) => e,
                other => Error::SdkLoad(other.to_string()),
            });
        }

        let runtime = self.host.when_ready().await?;
        info!("Runtime ready");
        Ok(runtime)
    }
}

impl std::fmt::Debug for SdkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkLoader")
            .field("config", &self.config)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}
