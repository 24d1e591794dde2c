//! Per-function analysis results and the module-level driver.
//!
//! [`FunctionAnalysis`] bundles the alias tree and the delinearization result of one
//! function. [`AnalysisManager`] computes them on demand, caches them by function name and
//! analyses the functions of a [`Module`] in parallel. Functions share nothing but the IR
//! they read, so no locking happens inside an analysis; the cache itself is a [`DashMap`].

use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    analysis::{AliasTree, DelinearizeInfo},
    config::AnalysisConfig,
    ir::{Function, Module},
};

/// Results of the enabled analyses for one function.
#[derive(Debug, Clone)]
pub struct FunctionAnalysis {
    function: String,
    alias_tree: Option<AliasTree>,
    delinearize: Option<DelinearizeInfo>,
}

impl FunctionAnalysis {
    /// Runs every analysis enabled in `config` on `function`.
    #[must_use]
    pub fn run(function: &Function, config: &AnalysisConfig) -> Self {
        let alias_tree = config
            .alias_tree
            .as_ref()
            .map(|c| AliasTree::build(function, c));
        let delinearize = config
            .delinearize
            .as_ref()
            .map(|c| DelinearizeInfo::compute(function, c));
        Self {
            function: function.name().to_string(),
            alias_tree,
            delinearize,
        }
    }

    /// Name of the analysed function.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// The memory hierarchy, if it was requested.
    #[must_use]
    pub fn alias_tree(&self) -> Option<&AliasTree> {
        self.alias_tree.as_ref()
    }

    /// The recovered arrays, if delinearization was requested.
    #[must_use]
    pub fn delinearize(&self) -> Option<&DelinearizeInfo> {
        self.delinearize.as_ref()
    }
}

/// Caching driver running the configured analyses over functions and modules.
///
/// Results are keyed by function name. A function that changes must be
/// [invalidated](Self::invalidate) before it is analysed again; the manager never compares
/// function bodies.
///
/// # Examples
///
/// ```rust
/// use memscope::analysis::AnalysisManager;
/// use memscope::config::AnalysisConfig;
/// use memscope::ir::{FunctionBuilder, Module, Type};
///
/// let mut module = Module::new("m");
/// for name in ["f", "g"] {
///     let mut b = FunctionBuilder::new(name);
///     let p = b.argument("p", Type::Ptr);
///     b.load(p, 4)?;
///     module.push(b.finish()?);
/// }
///
/// let manager = AnalysisManager::new(AnalysisConfig::default());
/// let results = manager.analyze_module(&module);
/// assert_eq!(results.len(), 2);
/// assert!(manager.get("g").is_some());
/// # Ok::<(), memscope::Error>(())
/// ```
pub struct AnalysisManager {
    config: AnalysisConfig,
    results: DashMap<String, Arc<FunctionAnalysis>>,
}

impl AnalysisManager {
    /// Creates a manager with an empty cache.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            results: DashMap::new(),
        }
    }

    /// The configuration analyses run with.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns the results for `function`, computing them if they are not cached.
    pub fn analyze(&self, function: &Function) -> Arc<FunctionAnalysis> {
        if let Some(cached) = self.results.get(function.name()) {
            return Arc::clone(cached.value());
        }
        let analysis = Arc::new(FunctionAnalysis::run(function, &self.config));
        log::debug!("analysed '{}'", function.name());
        // A concurrent caller may have won the race; keep the first result.
        Arc::clone(
            self.results
                .entry(function.name().to_string())
                .or_insert(analysis)
                .value(),
        )
    }

    /// Analyses every function of `module`, in parallel unless the configuration is
    /// sequential.
    ///
    /// # Returns
    ///
    /// The results in the order of `module.functions`.
    pub fn analyze_module(&self, module: &Module) -> Vec<Arc<FunctionAnalysis>> {
        log::debug!(
            "analysing {} functions of '{}'",
            module.functions.len(),
            module.name
        );
        if self.config.parallel {
            module.functions.par_iter().map(|f| self.analyze(f)).collect()
        } else {
            module.functions.iter().map(|f| self.analyze(f)).collect()
        }
    }

    /// Returns the cached results for the function named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FunctionAnalysis>> {
        self.results.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Drops the cached results for `name`. Returns `true` if there were any.
    pub fn invalidate(&self, name: &str) -> bool {
        self.results.remove(name).is_some()
    }

    /// Drops all cached results.
    pub fn clear(&self) {
        self.results.clear();
    }

    /// Number of cached functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Default for AnalysisManager {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Type};

    fn function(name: &str) -> Function {
        let mut b = FunctionBuilder::new(name);
        let a = b.argument("a", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let p = b.element_ptr(a, i, 8).unwrap();
        b.store(p, zero, 8).unwrap();
        b.end_loop().unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn test_run_respects_config() {
        let f = function("f");
        let both = FunctionAnalysis::run(&f, &AnalysisConfig::default());
        assert!(both.alias_tree().is_some());
        assert!(both.delinearize().is_some());
        assert_eq!(both.function_name(), "f");

        let alias = FunctionAnalysis::run(&f, &AnalysisConfig::alias_only());
        assert!(alias.alias_tree().is_some());
        assert!(alias.delinearize().is_none());

        let delinearize = FunctionAnalysis::run(&f, &AnalysisConfig::delinearize_only());
        assert!(delinearize.alias_tree().is_none());
        assert_eq!(delinearize.delinearize().map(DelinearizeInfo::array_count), Some(1));
    }

    #[test]
    fn test_cache_and_invalidate() {
        let manager = AnalysisManager::default();
        let f = function("f");

        let first = manager.analyze(&f);
        let second = manager.analyze(&f);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);

        assert!(manager.invalidate("f"));
        assert!(!manager.invalidate("f"));
        assert!(manager.get("f").is_none());

        let third = manager.analyze(&f);
        assert!(!Arc::ptr_eq(&first, &third));
        manager.clear();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_module_order_is_preserved() {
        let mut module = Module::new("m");
        for name in ["a", "b", "c", "d"] {
            module.push(function(name));
        }
        for config in [AnalysisConfig::default(), AnalysisConfig::sequential()] {
            let manager = AnalysisManager::new(config);
            let names: Vec<String> = manager
                .analyze_module(&module)
                .iter()
                .map(|r| r.function_name().to_string())
                .collect();
            assert_eq!(names, ["a", "b", "c", "d"]);
        }
    }
}
