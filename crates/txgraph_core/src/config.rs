//! Engine configuration.

/// Configuration for an [`crate::Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on committing passes before a commit gives up.
    pub max_commit_passes: usize,

    /// Whether commits reject unset mandatory relations.
    pub validate_mandatory_relations: bool,

    /// Whether each transaction traces its events at `TRACE` level.
    pub logging_listener: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_passes: 32,
            validate_mandatory_relations: true,
            logging_listener: true,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the committing pass limit.
    #[must_use]
    pub const fn max_commit_passes(mut self, value: usize) -> Self {
        self.max_commit_passes = value;
        self
    }

    /// Sets whether mandatory relations are validated on commit.
    #[must_use]
    pub const fn validate_mandatory_relations(mut self, value: bool) -> Self {
        self.validate_mandatory_relations = value;
        self
    }

    /// Sets whether the tracing listener is installed.
    #[must_use]
    pub const fn logging_listener(mut self, value: bool) -> Self {
        self.logging_listener = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_commit_passes, 32);
        assert!(config.validate_mandatory_relations);
        assert!(config.logging_listener);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .max_commit_passes(4)
            .validate_mandatory_relations(false)
            .logging_listener(false);
        assert_eq!(config.max_commit_passes, 4);
        assert!(!config.validate_mandatory_relations);
        assert!(!config.logging_listener);
    }
}
