//! Analysis configuration
//!
//! This module provides the knobs of the two analyses and of the module-level driver.
//! Every configuration is a plain value type with a [`Default`] implementation and a few
//! named presets, so callers rarely need to set individual fields.

/// Configuration of the delinearization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelinearizeConfig {
    /// Maximum number of dimensions recovered for an array (default: 8).
    /// Arrays needing more are marked invalid.
    pub max_dimensions: usize,

    /// Give arrays that are only accessed at constant offsets a single dimension equal to
    /// the common access size (default: true)
    pub infer_element_size: bool,
}

impl Default for DelinearizeConfig {
    fn default() -> Self {
        Self {
            max_dimensions: 8,
            infer_element_size: true,
        }
    }
}

impl DelinearizeConfig {
    /// Creates a configuration that only reports dimensions proven by loop strides
    ///
    /// Element sizes are never inferred from constant offsets and at most four
    /// dimensions are accepted.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_dimensions: 4,
            infer_element_size: false,
        }
    }
}

/// Configuration of the alias tree builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasTreeConfig {
    /// Use type-based alias tags of loads and stores (default: true)
    pub use_tbaa: bool,

    /// Describe calls that only touch argument memory by one location per pointer argument
    /// (default: true). When disabled these calls become unknown instructions.
    pub argmem_calls_as_locations: bool,
}

impl Default for AliasTreeConfig {
    fn default() -> Self {
        Self {
            use_tbaa: true,
            argmem_calls_as_locations: true,
        }
    }
}

impl AliasTreeConfig {
    /// Creates the most conservative configuration
    ///
    /// Type-based tags are ignored and every call with a memory footprint is treated as an
    /// unknown instruction.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            use_tbaa: false,
            argmem_calls_as_locations: false,
        }
    }
}

/// Which analyses run for each function and how a module is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Delinearization settings, `None` to skip delinearization
    pub delinearize: Option<DelinearizeConfig>,

    /// Alias tree settings, `None` to skip alias tree construction
    pub alias_tree: Option<AliasTreeConfig>,

    /// Analyse the functions of a module in parallel (default: true)
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delinearize: Some(DelinearizeConfig::default()),
            alias_tree: Some(AliasTreeConfig::default()),
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Only builds alias trees.
    #[must_use]
    pub fn alias_only() -> Self {
        Self {
            delinearize: None,
            ..Self::default()
        }
    }

    /// Only delinearizes array accesses.
    #[must_use]
    pub fn delinearize_only() -> Self {
        Self {
            alias_tree: None,
            ..Self::default()
        }
    }

    /// Runs both analyses but analyses the functions of a module one after another.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let strict = DelinearizeConfig::strict();
        assert!(!strict.infer_element_size);
        assert!(strict.max_dimensions < DelinearizeConfig::default().max_dimensions);

        assert!(AnalysisConfig::alias_only().delinearize.is_none());
        assert!(AnalysisConfig::alias_only().alias_tree.is_some());
        assert!(AnalysisConfig::delinearize_only().alias_tree.is_none());
        assert!(!AnalysisConfig::sequential().parallel);
        assert!(!AliasTreeConfig::conservative().use_tbaa);
    }
}
