//! Delinearization integration tests.
//!
//! These tests build loop nests with `FunctionBuilder` and check the arrays recovered by
//! `DelinearizeInfo::compute`:
//! 1. Dimensions and subscripts of constant and symbolic shapes
//! 2. Accepted and rejected base pointers
//! 3. Lookup consistency of the frozen result
//! 4. Independence from instruction order and repeated runs

use memscope::{
    analysis::{Array, DelinearizeInfo, Delinearizer, ScalarEvolution, Scev},
    config::DelinearizeConfig,
    ir::{CallEffect, CallTarget, Function, FunctionBuilder, Type, ValueId},
    Result,
};

fn compute(function: &Function) -> DelinearizeInfo {
    DelinearizeInfo::compute(function, &DelinearizeConfig::default())
}

/// Every element resolves to itself and its array; every base resolves to its array.
fn assert_index_consistent(info: &DelinearizeInfo) {
    for array in info.arrays() {
        assert_eq!(
            info.find_array(array.base()).map(Array::base),
            Some(array.base())
        );
        assert_eq!(
            info.find_array_for(array.base()).map(Array::base),
            Some(array.base())
        );
        for element in array.elements() {
            let (found, found_element) = info.find_element(element.ptr).unwrap();
            assert_eq!(found.base(), array.base());
            assert_eq!(found_element, element);
            if array.is_valid() && element.is_valid {
                assert_eq!(element.subscripts.len(), array.dimension_count());
            }
        }
    }
}

/// The instruction named `name`.
fn named(function: &Function, name: &str) -> ValueId {
    function
        .instructions()
        .map(|(id, _)| id)
        .find(|&id| function.value(id).and_then(|v| v.name.as_deref()) == Some(name))
        .unwrap()
}

/// `a[i * n + j]`, `a[j]` and `a[i * n]` in the requested order.
fn rows_and_columns(order: [usize; 3]) -> Result<Function> {
    let mut b = FunctionBuilder::new("f");
    let a = b.argument("a", Type::Ptr);
    let n = b.argument("n", Type::Int(64));
    let (zero, one) = (b.constant(0), b.constant(1));
    b.begin_loop("i");
    let i = b.induction("i", zero, one)?;
    b.begin_loop("j");
    let j = b.induction("j", zero, one)?;
    let row = b.mul(i, n)?;
    let idx = b.add(row, j)?;
    let ptrs = [
        b.element_ptr(a, idx, 4)?,
        b.element_ptr(a, j, 4)?,
        b.element_ptr(a, row, 4)?,
    ];
    for k in order {
        b.load(ptrs[k], 4)?;
    }
    b.end_loop()?;
    b.end_loop()?;
    b.finish()
}

#[test]
fn test_one_dimensional_array() -> Result<()> {
    let mut b = FunctionBuilder::new("f");
    let a = b.argument("a", Type::Ptr);
    let (zero, one) = (b.constant(0), b.constant(1));
    b.begin_loop("i");
    let i = b.induction("i", zero, one)?;
    let p = b.element_ptr(a, i, 4)?;
    let store = b.store(p, zero, 4)?;
    b.end_loop()?;
    let f = b.finish()?;

    let info = compute(&f);
    assert_index_consistent(&info);
    let se = ScalarEvolution::new(&f);

    let array = info.find_array(a).unwrap();
    assert!(array.is_valid());
    assert_eq!(array.dimensions(), &[Scev::constant(4)]);
    let (_, element) = info.find_access(store).unwrap();
    assert!(element.is_valid);
    assert_eq!(element.subscripts, vec![se.scev(i)]);
    Ok(())
}

#[test]
fn test_two_dimensional_symbolic_array() -> Result<()> {
    let f = rows_and_columns([0, 1, 2])?;
    let info = compute(&f);
    assert_index_consistent(&info);

    let a = ValueId::new(0);
    let n = ValueId::new(1);
    let array = info.find_array(a).unwrap();
    assert!(array.is_valid());
    assert_eq!(
        array.dimensions(),
        &[
            Scev::Mul(vec![Scev::constant(4), Scev::Unknown(n)]),
            Scev::constant(4)
        ]
    );

    let se = ScalarEvolution::new(&f);
    let (i, j) = (named(&f, "i"), named(&f, "j"));
    let subscripts: Vec<Vec<Scev>> = array
        .elements()
        .iter()
        .map(|e| e.subscripts.clone())
        .collect();
    assert_eq!(
        subscripts,
        vec![
            vec![se.scev(i), se.scev(j)],
            vec![Scev::zero(), se.scev(j)],
            vec![se.scev(i), Scev::zero()],
        ]
    );

    let text = info.to_text(&f);
    assert!(text.starts_with("Delinearization of 'f'"));
    assert!(text.contains("%a, valid"));
    assert!(text.contains("dimensions: [(4 * %n), 4]"));
    assert!(text.contains("[{0,+,1}<L0>][{0,+,1}<L1>]"));
    Ok(())
}

#[test]
fn test_three_dimensional_global() -> Result<()> {
    // float g[10][20][30]; g[i][j][k]
    let mut b = FunctionBuilder::new("f");
    let g = b.global("g", Some(24000));
    let (zero, one) = (b.constant(0), b.constant(1));
    let (plane, row) = (b.constant(600), b.constant(30));
    b.begin_loop("i");
    let i = b.induction("i", zero, one)?;
    b.begin_loop("j");
    let j = b.induction("j", zero, one)?;
    b.begin_loop("k");
    let k = b.induction("k", zero, one)?;
    let x = b.mul(i, plane)?;
    let y = b.mul(j, row)?;
    let xy = b.add(x, y)?;
    let idx = b.add(xy, k)?;
    let p = b.element_ptr(g, idx, 4)?;
    b.load(p, 4)?;
    b.end_loop()?;
    b.end_loop()?;
    b.end_loop()?;
    let f = b.finish()?;

    let info = compute(&f);
    let se = ScalarEvolution::new(&f);
    let (array, element) = info.find_element(p).unwrap();
    assert!(array.is_valid());
    assert_eq!(
        array.dimensions(),
        &[Scev::constant(2400), Scev::constant(120), Scev::constant(4)]
    );
    assert_eq!(element.subscripts, vec![se.scev(i), se.scev(j), se.scev(k)]);
    Ok(())
}

#[test]
fn test_reverse_loop() -> Result<()> {
    let mut b = FunctionBuilder::new("f");
    let a = b.argument("a", Type::Ptr);
    let (nine, minus_one) = (b.constant(9), b.constant(-1));
    b.begin_loop("i");
    let i = b.induction("i", nine, minus_one)?;
    let p = b.element_ptr(a, i, 8)?;
    b.load(p, 8)?;
    b.end_loop()?;
    let f = b.finish()?;

    let info = compute(&f);
    let se = ScalarEvolution::new(&f);
    let (array, element) = info.find_element(p).unwrap();
    assert_eq!(array.dimensions(), &[Scev::constant(8)]);
    assert!(element.is_valid);
    assert_eq!(element.subscripts, vec![se.scev(i)]);
    Ok(())
}

#[test]
fn test_indirect_call_produces_no_array() -> Result<()> {
    let mut b = FunctionBuilder::new("f");
    let callback = b.argument("callback", Type::Ptr);
    b.call(CallTarget::Indirect(callback), &[], CallEffect::Unknown, Type::Void)?;
    let f = b.finish()?;

    let info = compute(&f);
    assert!(info.is_empty());
    assert!(info.find_array(callback).is_none());
    assert!(info.find_element(callback).is_none());
    Ok(())
}

#[test]
fn test_accepted_bases() -> Result<()> {
    let mut b = FunctionBuilder::new("f");
    let handle = b.argument("handle", Type::Ptr);
    let size = b.constant(400);
    let malloc = b.function_symbol("malloc");
    let (zero, one) = (b.constant(0), b.constant(1));
    let rows = b.load_pointer(handle)?;
    let fresh = b.call(CallTarget::Direct(malloc), &[size], CallEffect::Allocator, Type::Ptr)?;
    b.begin_loop("i");
    let i = b.induction("i", zero, one)?;
    let src = b.element_ptr(rows, i, 4)?;
    let dst = b.element_ptr(fresh, i, 4)?;
    let v = b.load(src, 4)?;
    b.store(dst, v, 4)?;
    b.end_loop()?;
    let f = b.finish()?;

    let info = compute(&f);
    assert_index_consistent(&info);
    assert_eq!(info.array_count(), 3);
    for base in [handle, rows, fresh] {
        assert!(info.find_array(base).unwrap().is_valid(), "{base}");
    }
    // The handle itself is read at offset zero.
    let (array, element) = info.find_element(handle).unwrap();
    assert_eq!(array.base(), handle);
    assert!(element.subscripts.is_empty());
    Ok(())
}

#[test]
fn test_missing_and_non_pointer_values() -> Result<()> {
    let f = rows_and_columns([0, 1, 2])?;
    let info = compute(&f);
    let n = ValueId::new(1);
    assert!(info.find_array(n).is_none());
    assert!(info.find_element(n).is_none());
    assert!(info.find_array_for(n).is_none());
    assert!(info.find_access(n).is_none());
    assert!(info.find_element(ValueId::new(10_000)).is_none());
    Ok(())
}

#[test]
fn test_dimensions_do_not_depend_on_order() -> Result<()> {
    let a = ValueId::new(0);
    let reference = compute(&rows_and_columns([0, 1, 2])?)
        .find_array(a)
        .map(|array| array.dimensions().to_vec());
    assert!(reference.is_some());
    for order in [[2, 1, 0], [1, 0, 2], [2, 0, 1]] {
        let dimensions = compute(&rows_and_columns(order)?)
            .find_array(a)
            .map(|array| array.dimensions().to_vec());
        assert_eq!(dimensions, reference, "order {order:?}");
    }
    Ok(())
}

#[test]
fn test_repeated_runs_agree() -> Result<()> {
    let f = rows_and_columns([2, 0, 1])?;
    let first: Vec<Array> = compute(&f).arrays().cloned().collect();
    let second: Vec<Array> = compute(&f).arrays().cloned().collect();
    assert_eq!(first, second);

    // Reindexing the same arrays changes nothing either.
    let info = DelinearizeInfo::new(compute(&f).into_arrays());
    assert_eq!(info.arrays().cloned().collect::<Vec<_>>(), first);
    Ok(())
}

#[test]
fn test_results_can_be_edited_and_reindexed() -> Result<()> {
    let f = rows_and_columns([0, 1, 2])?;
    let a = ValueId::new(0);
    let delinearizer = Delinearizer::new(&f, &DelinearizeConfig::default());
    let mut set = delinearizer.run();

    let array = set.get_mut(a).unwrap();
    array.clear_dimensions();
    array.set_valid(false);
    let info = DelinearizeInfo::new(set);
    let array = info.find_array(a).unwrap();
    assert!(!array.is_valid());
    assert!(array.dimensions().is_empty());
    assert_index_consistent(&info);
    Ok(())
}
