//! Audit manager
//!
//! Owns everything that outlives a single flush: the validated
//! configuration, the descriptor cache, the username resolver and the
//! deletion hook. Hosts keep one manager per mapping and create one
//! pipeline per connection or unit of work.

use crate::config::{AuditConfig, CONFIG_FILE_NAME};
use crate::descriptor::DescriptorCache;
use crate::pipeline::{DeletionHook, FlushPipeline, RecomputeIfManaged, SharedPipeline};
use entaudit_core::{AuditResult, FixedUsername, MetadataProvider, UsernameResolver};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Entry point for hosts integrating the audit engine
#[derive(Clone)]
pub struct AuditManager {
    config: Arc<AuditConfig>,
    cache: Arc<DescriptorCache>,
    user: Arc<dyn UsernameResolver>,
    deletion_hook: Arc<dyn DeletionHook>,
}

impl AuditManager {
    /// Create a manager from a configuration
    ///
    /// Revisions are attributed to `config.default_username` until a
    /// resolver is set with [`AuditManager::with_username_resolver`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid.
    pub fn new(config: AuditConfig, provider: Arc<dyn MetadataProvider>) -> AuditResult<Self> {
        config.validate()?;
        let user: Arc<dyn UsernameResolver> =
            Arc::new(FixedUsername::new(config.default_username.clone()));
        let config = Arc::new(config);
        let cache = Arc::new(DescriptorCache::new(provider, Arc::clone(&config)));

        info!(
            audited = config.audited_entities.len(),
            revision_table = %config.revision_table_name,
            "Audit manager created"
        );

        Ok(AuditManager {
            config,
            cache,
            user,
            deletion_hook: Arc::new(RecomputeIfManaged),
        })
    }

    /// Create a manager from `entaudit.toml` in a directory, writing the
    /// default file first if none exists
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn open(dir: &Path, provider: Arc<dyn MetadataProvider>) -> AuditResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        AuditConfig::write_default_if_missing(&path)?;
        let config = AuditConfig::from_file(&path)?;
        Self::new(config, provider)
    }

    /// Attribute revisions to a different user source
    pub fn with_username_resolver(mut self, user: Arc<dyn UsernameResolver>) -> Self {
        self.user = user;
        self
    }

    /// Replace the hook run on deleted entities before their snapshot
    pub fn with_deletion_hook(mut self, hook: Arc<dyn DeletionHook>) -> Self {
        self.deletion_hook = hook;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Shared descriptor cache
    pub fn cache(&self) -> &Arc<DescriptorCache> {
        &self.cache
    }

    /// Build descriptors and insert statements for every audited class
    ///
    /// # Errors
    ///
    /// Returns the first mapping error encountered.
    pub fn warm_up(&self) -> AuditResult<()> {
        self.cache.warm_up()
    }

    /// Create an idle pipeline for one unit of work
    pub fn pipeline(&self) -> FlushPipeline {
        FlushPipeline::new(Arc::clone(&self.cache), Arc::clone(&self.user))
            .with_deletion_hook(Arc::clone(&self.deletion_hook))
    }

    /// Create a pipeline that can be shared between threads
    pub fn shared_pipeline(&self) -> SharedPipeline {
        SharedPipeline::new(self.pipeline())
    }
}

impl std::fmt::Debug for AuditManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditManager")
            .field("config", &self.config)
            .field("cached_classes", &self.cache.len())
            .finish()
    }
}
