// loops.rs — Loop Scopes
//
// Tests for serial / parallel / vectorized / unroll / thread_binding / grid:
//   - each loop kind assembles into a For tagged with that kind
//   - constant stop < start is rejected when the loop opens
//   - loop variable dtype follows the first non-literal bound
//   - grid([]) emits no loop, grid([n]) matches serial(0, n)
//   - grid nests loops outermost first

use tir_builder::ir::{structural_equal, AttrValue, Annotations, DataType, ForKind, PrimExpr, Stmt, Var};
use tir_builder::tir;
use tir_builder::{BuildError, ErrorCategory, IRBuilder};

fn body_of(stmt: &Stmt) -> &Stmt {
    match stmt {
        Stmt::For(f) => &f.body,
        other => panic!("expected for, got {:?}", other),
    }
}

// ── Test 1: loop kinds ────────────────────────────────────────────────────

#[test]
fn test_loop_kinds() {
    for kind in [ForKind::Serial, ForKind::Parallel, ForKind::Vectorized, ForKind::Unrolled] {
        let session = IRBuilder::enter().unwrap();
        {
            let _l = match kind {
                ForKind::Serial => tir::serial(0, 8, None),
                ForKind::Parallel => tir::parallel(0, 8, None),
                ForKind::Vectorized => tir::vectorized(0, 8, None),
                _ => tir::unroll(0, 8, None),
            }
            .unwrap();
            tir::evaluate(0).unwrap();
        }
        let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
            panic!("expected for");
        };
        assert_eq!(f.kind, kind);
        assert_eq!(f.min, PrimExpr::int(0));
        assert_eq!(f.extent, PrimExpr::int(8));
        assert!(f.thread_binding.is_none());
    }
}

#[test]
fn test_loop_var_and_range() {
    let session = IRBuilder::enter().unwrap();
    let loop_var;
    {
        let l = tir::serial(2, 10, None).unwrap();
        loop_var = l.var().clone();
        tir::evaluate(l.var()).unwrap();
    }
    let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected for");
    };
    assert_eq!(f.loop_var, loop_var);
    assert_eq!(f.loop_var.dtype, DataType::int(32));
    assert_eq!(f.min, PrimExpr::int(2));
    assert_eq!(f.extent, PrimExpr::int(8));
    assert_eq!(*f.body, Stmt::Evaluate(PrimExpr::Var(loop_var)));
}

// ── Test 2: empty constant range ──────────────────────────────────────────

#[test]
fn test_reversed_range_rejected() {
    let session = IRBuilder::enter().unwrap();
    let err = tir::serial(10, 2, None).unwrap_err();
    assert!(matches!(err, BuildError::ArgumentShape { op: "serial", .. }));
    assert_eq!(err.category(), ErrorCategory::ArgumentShape);
    // Nothing was pushed.
    assert_eq!(session.builder().depth(), 0);
}

#[test]
fn test_zero_trip_loop_allowed() {
    let session = IRBuilder::enter().unwrap();
    tir::serial(4, 4, None).unwrap().close().unwrap();
    let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected for");
    };
    assert_eq!(f.extent, PrimExpr::int(0));
    assert!(f.body.is_no_op());
}

// ── Test 3: loop var dtype ────────────────────────────────────────────────

#[test]
fn test_loop_var_dtype_follows_symbolic_bound() {
    let _session = IRBuilder::enter().unwrap();
    let n = Var::new("n", DataType::int(64));
    let l = tir::serial(0, &n, None).unwrap();
    assert_eq!(l.var().dtype, DataType::int(64));
}

#[test]
fn test_index_dtype_config() {
    let config = tir_builder::BuilderConfig::default().with_index_dtype(DataType::int(64));
    let session = IRBuilder::enter_with(config).unwrap();
    {
        let l = tir::serial(0, 4, None).unwrap();
        assert_eq!(l.var().dtype, DataType::int(64));
    }
    let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected for");
    };
    assert_eq!(f.extent, PrimExpr::int_of(4, DataType::int(64)));
}

// ── Test 4: annotations and thread binding ────────────────────────────────

#[test]
fn test_loop_annotations() {
    let session = IRBuilder::enter().unwrap();
    let mut ann = Annotations::new();
    ann.insert("pragma_auto_unroll_max_step".to_owned(), AttrValue::Int(16));
    tir::serial(0, 4, Some(ann.clone())).unwrap().close().unwrap();
    let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected for");
    };
    assert_eq!(f.annotations, ann);
}

#[test]
fn test_thread_binding() {
    let session = IRBuilder::enter().unwrap();
    tir::thread_binding(0, 32, "threadIdx.x", None)
        .unwrap()
        .close()
        .unwrap();
    let Stmt::For(f) = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected for");
    };
    assert_eq!(f.kind, ForKind::ThreadBinding);
    let iv = f.thread_binding.expect("thread binding iter var");
    assert_eq!(iv.thread_tag, "threadIdx.x");
    assert_eq!(iv.var, f.loop_var);
    assert_eq!(iv.dom.unwrap().extent, PrimExpr::int(32));
}

// ── Test 5: grid ──────────────────────────────────────────────────────────

#[test]
fn test_empty_grid_inlines_body() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let g = tir::grid(Vec::<PrimExpr>::new()).unwrap();
        assert!(g.vars().is_empty());
        tir::evaluate(1).unwrap();
        tir::evaluate(2).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    let Stmt::Seq(body) = &func.body else {
        panic!("expected seq, got {:?}", func.body);
    };
    assert_eq!(body.len(), 2);
    assert!(body.iter().all(|s| matches!(s, Stmt::Evaluate(_))));
}

#[test]
fn test_grid_nests_outermost_first() {
    let session = IRBuilder::enter().unwrap();
    let vars;
    {
        let g = tir::grid([4, 8, 16]).unwrap();
        vars = g.vars().to_vec();
        tir::evaluate(0).unwrap();
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let mut cur = &stmt;
    for (var, extent) in vars.iter().zip([4, 8, 16]) {
        let Stmt::For(f) = cur else {
            panic!("expected for, got {:?}", cur);
        };
        assert_eq!(&f.loop_var, var);
        assert_eq!(f.kind, ForKind::Serial);
        assert_eq!(f.extent, PrimExpr::int(extent));
        cur = body_of(cur);
    }
    assert_eq!(*cur, Stmt::Evaluate(PrimExpr::int(0)));
}

fn loop_func(use_grid: bool) -> tir_builder::ir::PrimFunc {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let n = tir::arg_var("n", Var::new("n", DataType::int(32))).unwrap();
        if use_grid {
            let g = tir::grid([PrimExpr::Var(n)]).unwrap();
            tir::evaluate(&g.vars()[0]).unwrap();
        } else {
            let l = tir::serial(0, &n, None).unwrap();
            tir::evaluate(l.var()).unwrap();
        }
    }
    session.finish().unwrap().into_func().unwrap()
}

#[test]
fn test_single_grid_matches_serial() {
    assert!(structural_equal(&loop_func(true), &loop_func(false)));
}
