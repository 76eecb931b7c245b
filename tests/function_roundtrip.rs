// function_roundtrip.rs — Function Construction
//
// End-to-end construction of prim funcs:
//   - a loop + block + store function round-trips into the expected tree
//   - parameters keep binding order; buffer maps follow them
//   - func_name / func_attrs / func_ret are single-use
//   - match_buffer on a parameter and preflattened_buffer
//   - malformed parameter lists are rejected when the function seals

use tir_builder::ir::{
    structural_equal, structural_hash, AttrValue, Annotations, DataType, PrimExpr, PrimFunc, Range, Stmt, Type, Var,
};
use tir_builder::tir::{self, axis, BufferOptions};
use tir_builder::{BuildError, ErrorCategory, FrameKind, IRBuilder};

fn f32() -> DataType {
    DataType::float(32)
}

/// B[i] = A[i] for i in 0..n, with A and B as buffer parameters.
fn build_copy(n: i32) -> Result<PrimFunc, BuildError> {
    let session = IRBuilder::enter()?;
    {
        let _f = tir::prim_func()?;
        tir::func_name("copy")?;
        let a = tir::arg_buffer("A", tir::buffer_decl([n], f32(), BufferOptions::new())?)?;
        let b = tir::arg_buffer("B", tir::buffer_decl([n], f32(), BufferOptions::new())?)?;
        let i = tir::serial(0, n, None)?;
        let _blk = tir::block("copy", false)?;
        let vi = axis::spatial(Range::new(0, n), i.var(), None)?;
        tir::reads([a.point_region(vec![PrimExpr::from(&vi)])])?;
        tir::writes([b.point_region(vec![PrimExpr::from(&vi)])])?;
        tir::buffer_store(&b, a.load(vec![PrimExpr::from(&vi)]), vec![PrimExpr::from(&vi)])?;
    }
    session.finish()?.into_func()
}

// ── Test 1: round trip ────────────────────────────────────────────────────

#[test]
fn test_copy_round_trip() {
    let func = build_copy(16).unwrap();
    assert_eq!(func.name.as_deref(), Some("copy"));

    let names: Vec<&str> = func.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    let buffers: Vec<&str> = func.param_buffers().map(|b| b.name.as_str()).collect();
    assert_eq!(buffers, vec!["A", "B"]);
    assert_eq!(func.ret_type, Type::void());

    // Exactly one loop wrapping one block wrapping one store.
    let Stmt::For(loop_) = &func.body else {
        panic!("expected for, got {:?}", func.body);
    };
    let Stmt::BlockRealize(realize) = &*loop_.body else {
        panic!("expected block realize, got {:?}", loop_.body);
    };
    assert_eq!(realize.block.name, "copy");
    assert_eq!(realize.block.reads.len(), 1);
    assert_eq!(realize.block.reads[0].buffer.name, "A");
    assert_eq!(realize.block.writes[0].buffer.name, "B");
    assert_eq!(realize.iter_values, vec![PrimExpr::Var(loop_.loop_var.clone())]);
    let Stmt::BufferStore { buffer, .. } = &*realize.block.body else {
        panic!("expected store, got {:?}", realize.block.body);
    };
    assert_eq!(buffer.name, "B");
}

#[test]
fn test_identical_builds_are_structurally_equal() {
    let first = build_copy(16).unwrap();
    let second = build_copy(16).unwrap();
    assert_ne!(first.params[0], second.params[0]);
    assert!(structural_equal(&first, &second));
    assert_eq!(structural_hash(&first), structural_hash(&second));

    let other = build_copy(32).unwrap();
    assert!(!structural_equal(&first, &other));
}

// ── Test 2: scalar args ───────────────────────────────────────────────────

#[test]
fn test_arg_var_keeps_identity() {
    let session = IRBuilder::enter().unwrap();
    let original = Var::new("tmp", DataType::int(32));
    let renamed;
    {
        let _f = tir::prim_func().unwrap();
        renamed = tir::arg_var("n", original.clone()).unwrap();
        tir::evaluate(&renamed).unwrap();
    }
    assert_eq!(renamed, original);
    assert_eq!(renamed.name, "n");
    let func = session.finish().unwrap().into_func().unwrap();
    assert_eq!(func.params, vec![original]);
    assert_eq!(func.param_by_name("n").map(|v| v.id), Some(renamed.id));
}

#[test]
fn test_arg_outside_function() {
    let _session = IRBuilder::enter().unwrap();
    let err = tir::arg_var("n", Var::new("n", DataType::int(32))).unwrap_err();
    assert_eq!(
        err,
        BuildError::NoEnclosingScope {
            op: "arg",
            expected: FrameKind::PrimFunc,
        }
    );
}

// ── Test 3: single-use function fields ────────────────────────────────────

#[test]
fn test_function_fields() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        tir::func_name("main").unwrap();
        let mut attrs = Annotations::new();
        attrs.insert("global_symbol".to_owned(), AttrValue::from("main"));
        attrs.insert("tir.noalias".to_owned(), AttrValue::Bool(true));
        tir::func_attrs(attrs).unwrap();
        let ret = tir::func_ret(Type::Prim(DataType::int(32))).unwrap();
        assert_eq!(ret, Type::Prim(DataType::int(32)));
        tir::evaluate(0).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    assert_eq!(func.name.as_deref(), Some("main"));
    assert_eq!(func.ret_type, Type::Prim(DataType::int(32)));
    let keys: Vec<&str> = func.attrs.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["global_symbol", "tir.noalias"]);
}

#[test]
fn test_function_fields_set_once() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        tir::func_name("main").unwrap();
        assert!(matches!(
            tir::func_name("other").unwrap_err(),
            BuildError::DuplicateSetting { field: "func_name", .. }
        ));
        tir::func_attrs(Annotations::new()).unwrap();
        let err = tir::func_attrs(Annotations::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DuplicateSetting);
        tir::func_ret(Type::void()).unwrap();
        assert!(matches!(
            tir::func_ret(Type::void()).unwrap_err(),
            BuildError::DuplicateSetting { field: "func_ret", .. }
        ));
        tir::evaluate(0).unwrap();
    }
    // The first rejected setting fails the whole function.
    assert!(matches!(
        session.finish().unwrap_err(),
        BuildError::DuplicateSetting { field: "func_name", .. }
    ));
}

#[test]
fn test_function_field_inside_loop() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let _i = tir::serial(0, 4, None).unwrap();
    let err = tir::func_name("f").unwrap_err();
    assert_eq!(
        err,
        BuildError::ScopeMismatch {
            op: "func_name",
            expected: FrameKind::PrimFunc,
            found: FrameKind::For,
        }
    );
}

// ── Test 4: match_buffer on a parameter ───────────────────────────────────

#[test]
fn test_match_buffer_param_and_preflattened() {
    let session = IRBuilder::enter().unwrap();
    let handle;
    {
        let _f = tir::prim_func().unwrap();
        handle = tir::arg_var("a", Var::new("a", DataType::handle())).unwrap();
        let flat = tir::match_buffer(&handle, [64], f32(), BufferOptions::new().name("A")).unwrap();
        let shaped = tir::preflattened_buffer(&flat, [8, 8], f32(), BufferOptions::new().name("A")).unwrap();
        assert_eq!(shaped.data, flat.data);
        tir::evaluate(0).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    assert_eq!(func.buffer_map.get(&handle).map(|b| b.ndim()), Some(1));
    assert_eq!(func.preflattened_buffer_map.get(&handle).map(|b| b.ndim()), Some(2));
}

#[test]
fn test_match_buffer_param_bound_once() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let handle = tir::arg_var("a", Var::new("a", DataType::handle())).unwrap();
    let flat = tir::match_buffer(&handle, [64], f32(), BufferOptions::new().name("A")).unwrap();
    tir::preflattened_buffer(&flat, [8, 8], f32(), BufferOptions::new().name("A")).unwrap();

    let err = tir::match_buffer(&handle, [64], f32(), BufferOptions::new()).unwrap_err();
    assert!(matches!(err, BuildError::ArgumentShape { op: "match_buffer", .. }));
    assert!(matches!(
        tir::preflattened_buffer(&flat, [8, 8], f32(), BufferOptions::new().name("A")).unwrap_err(),
        BuildError::DuplicateSetting { .. }
    ));
}

#[test]
fn test_preflattened_without_match() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let unbound = tir::buffer_decl([64], f32(), BufferOptions::new()).unwrap();
    let err = tir::preflattened_buffer(&unbound, [8, 8], f32(), BufferOptions::new()).unwrap_err();
    assert!(matches!(err, BuildError::ArgumentShape { op: "preflattened_buffer", .. }));
}

// ── Test 5: malformed parameter lists ─────────────────────────────────────

#[test]
fn test_duplicate_param_rejected() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let n = Var::new("n", DataType::int(32));
        tir::arg_var("n", n.clone()).unwrap();
        tir::arg_var("m", n).unwrap();
    }
    let err = session.finish().unwrap_err();
    assert!(matches!(err, BuildError::InvalidFunction { .. }));
    assert_eq!(err.category(), ErrorCategory::ArgumentShape);
}

#[test]
fn test_matched_non_param_rejected() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let stray = Var::new("stray", DataType::handle());
        tir::match_buffer(stray, [4], f32(), BufferOptions::new()).unwrap();
    }
    assert!(matches!(
        session.finish().unwrap_err(),
        BuildError::InvalidFunction { .. }
    ));
}
