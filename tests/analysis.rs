//! Module driver integration tests.
//!
//! These tests run `AnalysisManager` over multi-function modules:
//! 1. Parallel and sequential runs produce identical results
//! 2. Results are cached by function name until invalidated
//! 3. Disabled analyses are not computed

use std::sync::Arc;

use memscope::{
    analysis::{AliasTreePrinter, AnalysisManager, FunctionAnalysis},
    config::AnalysisConfig,
    ir::{CallEffect, CallTarget, Function, FunctionBuilder, Module, Type},
    Result,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `for (i < n) for (j < m) a[i * m + j] = b[i * m + j] * k;` with `depth` nested loops.
fn kernel(name: &str, depth: usize) -> Result<Function> {
    let mut b = FunctionBuilder::new(name);
    let dst = b.noalias_argument("dst");
    let src = b.argument("src", Type::Ptr);
    let m = b.argument("m", Type::Int(64));
    let (zero, one) = (b.constant(0), b.constant(1));

    let mut idx = zero;
    for level in 0..depth {
        b.begin_loop(&format!("L{level}"));
        let iv = b.induction(&format!("i{level}"), zero, one)?;
        let scaled = b.mul(idx, m)?;
        idx = b.add(scaled, iv)?;
    }
    let from = b.element_ptr(src, idx, 4)?;
    let to = b.element_ptr(dst, idx, 4)?;
    let v = b.load(from, 4)?;
    b.store(to, v, 4)?;
    for _ in 0..depth {
        b.end_loop()?;
    }
    b.finish()
}

/// A function that hands a pointer to code it cannot see.
fn opaque(name: &str) -> Result<Function> {
    let mut b = FunctionBuilder::new(name);
    let p = b.argument("p", Type::Ptr);
    let handler = b.argument("handler", Type::Ptr);
    let zero = b.constant(0);
    b.store(p, zero, 8)?;
    b.call(CallTarget::Indirect(handler), &[p], CallEffect::Unknown, Type::Void)?;
    b.finish()
}

fn module() -> Result<Module> {
    let mut module = Module::new("kernels");
    for depth in 1..=4 {
        module.push(kernel(&format!("kernel{depth}"), depth)?);
    }
    module.push(opaque("callback")?);
    Ok(module)
}

/// A comparable rendering of one result.
fn render(analysis: &FunctionAnalysis, function: &Function) -> (Option<String>, Option<String>) {
    (
        analysis
            .alias_tree()
            .map(|tree| AliasTreePrinter::new(tree, function).to_text()),
        analysis.delinearize().map(|info| info.to_text(function)),
    )
}

#[test]
fn test_parallel_matches_sequential() -> Result<()> {
    init_logging();
    let module = module()?;

    let parallel = AnalysisManager::new(AnalysisConfig::default());
    let sequential = AnalysisManager::new(AnalysisConfig::sequential());
    let a = parallel.analyze_module(&module);
    let b = sequential.analyze_module(&module);

    assert_eq!(a.len(), module.functions.len());
    for ((x, y), function) in a.iter().zip(&b).zip(&module.functions) {
        assert_eq!(x.function_name(), function.name());
        assert_eq!(render(x, function), render(y, function));
    }
    Ok(())
}

#[test]
fn test_module_results_describe_each_kernel() -> Result<()> {
    init_logging();
    let module = module()?;
    let manager = AnalysisManager::default();
    let results = manager.analyze_module(&module);

    for (depth, analysis) in (1..=4).zip(&results) {
        let info = analysis.delinearize().unwrap();
        assert_eq!(info.array_count(), 2);
        for array in info.arrays() {
            assert!(array.is_valid(), "{}", analysis.function_name());
            assert_eq!(array.dimension_count(), depth);
        }

        let tree = analysis.alias_tree().unwrap();
        assert_eq!(tree.unknown_nodes().count(), 0);
    }

    let callback = &results[4];
    assert!(callback.delinearize().unwrap().arrays().all(|a| a.is_valid()));
    assert_eq!(callback.alias_tree().unwrap().unknown_nodes().count(), 1);
    Ok(())
}

#[test]
fn test_cache_and_invalidation() -> Result<()> {
    let module = module()?;
    let manager = AnalysisManager::default();
    assert!(manager.is_empty());

    let first = manager.analyze_module(&module);
    assert_eq!(manager.len(), module.functions.len());
    let again = manager.analyze_module(&module);
    for (x, y) in first.iter().zip(&again) {
        assert!(Arc::ptr_eq(x, y));
    }

    assert!(manager.invalidate("kernel2"));
    assert!(!manager.invalidate("kernel2"));
    assert!(manager.get("kernel2").is_none());
    let recomputed = manager.analyze(&module.functions[1]);
    assert!(!Arc::ptr_eq(&recomputed, &first[1]));
    assert_eq!(
        render(&recomputed, &module.functions[1]),
        render(&first[1], &module.functions[1])
    );

    manager.clear();
    assert!(manager.is_empty());
    Ok(())
}

#[test]
fn test_disabled_analyses_are_skipped() -> Result<()> {
    let function = kernel("kernel", 2)?;

    let alias = FunctionAnalysis::run(&function, &AnalysisConfig::alias_only());
    assert!(alias.alias_tree().is_some());
    assert!(alias.delinearize().is_none());

    let arrays = FunctionAnalysis::run(&function, &AnalysisConfig::delinearize_only());
    assert!(arrays.alias_tree().is_none());
    assert!(arrays.delinearize().is_some());
    Ok(())
}
