//! Configuration for the sync engine.

/// Default number of lock stripes.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Application id remote keys must carry.
    pub app_id: String,
    /// Number of stripes in the per-key lock table.
    pub lock_stripes: usize,
}

impl EngineConfig {
    /// Creates a configuration for the given application.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }

    /// Sets the number of lock stripes.
    pub fn with_lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("synkit")
    }
}
