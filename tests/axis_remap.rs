// axis_remap.rs — Block Axes and Remap
//
// Tests for axis::spatial/reduce/scan/opaque and axis::remap:
//   - each declaration appends one iter var and binding to the block
//   - remap("SR", ..) yields a spatial then a reduce axis
//   - each remapped axis takes the domain of its enclosing loop
//   - malformed remaps fail and the session reports them
//   - an explicit dtype retypes the remapped domain and binding

use tir_builder::ir::{BlockRealize, DataType, IterVarKind, PrimExpr, Range, Stmt};
use tir_builder::tir::{self, axis};
use tir_builder::{BuildError, ErrorCategory, FrameKind, IRBuilder};

fn find_realize(stmt: &Stmt) -> Option<&BlockRealize> {
    match stmt {
        Stmt::BlockRealize(r) => Some(r),
        other => other.children().into_iter().find_map(find_realize),
    }
}

// ── Test 1: explicit axes ─────────────────────────────────────────────────

#[test]
fn test_axis_kinds() {
    let session = IRBuilder::enter().unwrap();
    let declared;
    {
        let i = tir::serial(0, 16, None).unwrap();
        let _b = tir::block("b", false).unwrap();
        let dom = || Range::new(0, 16);
        declared = vec![
            axis::spatial(dom(), i.var(), None).unwrap(),
            axis::reduce(dom(), i.var(), None).unwrap(),
            axis::scan(dom(), i.var(), None).unwrap(),
            axis::opaque(dom(), i.var(), Some(DataType::int(64))).unwrap(),
        ];
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let realize = find_realize(&stmt).expect("block realize");
    let kinds: Vec<IterVarKind> = realize.block.iter_vars.iter().map(|iv| iv.kind).collect();
    assert_eq!(
        kinds,
        vec![
            IterVarKind::Spatial,
            IterVarKind::Reduce,
            IterVarKind::Scan,
            IterVarKind::Opaque
        ]
    );
    assert_eq!(realize.iter_values.len(), 4);
    for (iv, var) in realize.block.iter_vars.iter().zip(&declared) {
        assert_eq!(&iv.var, var);
    }
    assert_eq!(declared[0].dtype, DataType::int(32));
    assert_eq!(declared[3].dtype, DataType::int(64));
}

#[test]
fn test_axis_needs_block() {
    let _session = IRBuilder::enter().unwrap();
    let i = tir::serial(0, 4, None).unwrap();
    let err = axis::spatial(Range::new(0, 4), i.var(), None).unwrap_err();
    assert_eq!(
        err,
        BuildError::NoEnclosingScope {
            op: "axis::spatial",
            expected: FrameKind::Block,
        }
    );
}

// ── Test 2: remap ─────────────────────────────────────────────────────────

#[test]
fn test_remap_spatial_reduce() {
    let session = IRBuilder::enter().unwrap();
    let i_var;
    let k_var;
    let axes;
    {
        let i = tir::serial(0, 16, None).unwrap();
        let k = tir::serial(4, 12, None).unwrap();
        i_var = i.var().clone();
        k_var = k.var().clone();
        let _b = tir::block("update", false).unwrap();
        axes = axis::remap("SR", [i.var(), k.var()], None).unwrap();
    }
    assert_eq!(axes.len(), 2);

    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let realize = find_realize(&stmt).expect("block realize");
    let ivs = &realize.block.iter_vars;
    assert_eq!(ivs.len(), 2);

    assert_eq!(ivs[0].kind, IterVarKind::Spatial);
    assert_eq!(ivs[0].var, axes[0]);
    assert_eq!(ivs[0].var.name, format!("v{}", i_var.name));
    assert_eq!(realize.iter_values[0], PrimExpr::Var(i_var));
    assert_eq!(ivs[0].dom, Some(Range::from_min_extent(PrimExpr::int(0), PrimExpr::int(16))));

    assert_eq!(ivs[1].kind, IterVarKind::Reduce);
    assert_eq!(realize.iter_values[1], PrimExpr::Var(k_var));
    assert_eq!(ivs[1].dom, Some(Range::from_min_extent(PrimExpr::int(4), PrimExpr::int(8))));
}

#[test]
fn test_remap_with_grid_vars() {
    let session = IRBuilder::enter().unwrap();
    {
        let g = tir::grid([8, 4]).unwrap();
        let _b = tir::block("b", false).unwrap();
        let axes = axis::remap("SS", g.vars(), None).unwrap();
        assert_eq!(axes.len(), 2);
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let realize = find_realize(&stmt).expect("block realize");
    let extents: Vec<PrimExpr> = realize
        .block
        .iter_vars
        .iter()
        .map(|iv| iv.dom.clone().unwrap().extent)
        .collect();
    assert_eq!(extents, vec![PrimExpr::int(8), PrimExpr::int(4)]);
}

// ── Test 3: malformed remaps ──────────────────────────────────────────────

#[test]
fn test_remap_length_mismatch() {
    let _session = IRBuilder::enter().unwrap();
    let i = tir::serial(0, 4, None).unwrap();
    let j = tir::serial(0, 4, None).unwrap();
    let _b = tir::block("b", false).unwrap();
    let err = axis::remap("S", [i.var(), j.var()], None).unwrap_err();
    assert!(matches!(err, BuildError::ArgumentShape { op: "axis::remap", .. }));
    assert_eq!(err.category(), ErrorCategory::ArgumentShape);
}

#[test]
fn test_remap_rejects_unknown_kind_and_non_loop_binding() {
    let session = IRBuilder::enter().unwrap();
    {
        let i = tir::serial(0, 4, None).unwrap();
        let _b = tir::block("b", false).unwrap();

        let err = axis::remap("SX", [i.var(), i.var()], None).unwrap_err();
        assert!(matches!(err, BuildError::ArgumentShape { .. }));

        let expr = PrimExpr::from(i.var()) * 2;
        let err = axis::remap("S", [expr], None).unwrap_err();
        assert!(matches!(err, BuildError::ArgumentShape { .. }));

        let free = tir_builder::ir::Var::new("free", DataType::int(32));
        let err = axis::remap("SS", [i.var(), &free], None).unwrap_err();
        assert!(matches!(err, BuildError::ArgumentShape { .. }));
    }
    // The session reports the first malformed remap.
    let err = session.finish().unwrap_err();
    assert!(err.to_string().contains("unknown axis kind 'X'"), "{err}");
}

// ── Test 4: explicit remap dtype ──────────────────────────────────────────

#[test]
fn test_remap_dtype_retypes_domain_and_binding() {
    let session = IRBuilder::enter().unwrap();
    let i_var;
    {
        let i = tir::serial(2, 10, None).unwrap();
        i_var = i.var().clone();
        let _b = tir::block("b", false).unwrap();
        let axes = axis::remap("S", [i.var()], Some(DataType::int(64))).unwrap();
        assert_eq!(axes[0].dtype, DataType::int(64));
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let realize = find_realize(&stmt).expect("block realize");
    let dom = realize.block.iter_vars[0].dom.clone().expect("axis domain");
    assert_eq!(dom.min, PrimExpr::int_of(2, DataType::int(64)));
    assert_eq!(dom.extent, PrimExpr::int_of(8, DataType::int(64)));
    assert_eq!(realize.iter_values[0], PrimExpr::cast(DataType::int(64), PrimExpr::Var(i_var)));
    assert_eq!(realize.iter_values[0].dtype(), DataType::int(64));
}
