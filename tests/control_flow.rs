// control_flow.rs — Conditional, Binding and Attribute Scopes
//
// Tests for if_/then_/else_, while_, let_, assert_, attr, env_thread,
// launch_thread and realize:
//   - if/then/else pairing rules
//   - each scope wraps its body in the matching statement node
//   - env threads round-trip into a thread_extent attr
//   - realize requires a buffer declared by an enclosing scope

use tir_builder::ir::{AttrNode, DataType, IterVarKind, PrimExpr, Range, Stmt, Var};
use tir_builder::tir::{self, BufferOptions};
use tir_builder::{BuildError, ErrorCategory, FrameKind, IRBuilder};

// ── Test 1: if / then / else ──────────────────────────────────────────────

#[test]
fn test_if_then_else() {
    let session = IRBuilder::enter().unwrap();
    let x = Var::new("x", DataType::int(32));
    {
        let _if = tir::if_(PrimExpr::from(&x).less_than(10)).unwrap();
        {
            let _then = tir::then_().unwrap();
            tir::evaluate(1).unwrap();
        }
        {
            let _else = tir::else_().unwrap();
            tir::evaluate(2).unwrap();
        }
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();
    let Stmt::IfThenElse {
        condition,
        then_case,
        else_case,
    } = stmt
    else {
        panic!("expected if_then_else");
    };
    assert_eq!(condition.dtype(), DataType::bool());
    assert_eq!(*then_case, Stmt::Evaluate(PrimExpr::int(1)));
    assert_eq!(else_case.map(|s| *s), Some(Stmt::Evaluate(PrimExpr::int(2))));
}

#[test]
fn test_if_without_else() {
    let session = IRBuilder::enter().unwrap();
    {
        let _if = tir::if_(true).unwrap();
        let _then = tir::then_().unwrap();
        tir::evaluate(1).unwrap();
    }
    let Stmt::IfThenElse { else_case, .. } = session.finish().unwrap().into_stmt().unwrap() else {
        panic!("expected if_then_else");
    };
    assert!(else_case.is_none());
}

// ── Test 2: pairing violations ────────────────────────────────────────────

#[test]
fn test_then_without_if() {
    let _session = IRBuilder::enter().unwrap();
    let err = tir::then_().unwrap_err();
    assert!(matches!(err, BuildError::Pairing { op: "then_", .. }));
    assert_eq!(err.category(), ErrorCategory::PairingViolation);
}

#[test]
fn test_else_without_then() {
    let _session = IRBuilder::enter().unwrap();
    let _if = tir::if_(true).unwrap();
    let err = tir::else_().unwrap_err();
    assert!(matches!(err, BuildError::Pairing { op: "else_", .. }));
}

#[test]
fn test_else_while_then_open() {
    let _session = IRBuilder::enter().unwrap();
    let _if = tir::if_(true).unwrap();
    let _then = tir::then_().unwrap();
    assert!(matches!(
        tir::else_().unwrap_err(),
        BuildError::Pairing { op: "else_", .. }
    ));
}

#[test]
fn test_second_then_rejected() {
    let _session = IRBuilder::enter().unwrap();
    let _if = tir::if_(true).unwrap();
    tir::then_().unwrap().close().unwrap();
    let err = tir::then_().unwrap_err();
    assert!(matches!(err, BuildError::Pairing { op: "then_", .. }));
    tir::else_().unwrap().close().unwrap();
    assert!(matches!(
        tir::else_().unwrap_err(),
        BuildError::Pairing { op: "else_", .. }
    ));
}

#[test]
fn test_statement_outside_branch_rejected() {
    let session = IRBuilder::enter().unwrap();
    {
        let _if = tir::if_(true).unwrap();
        tir::evaluate(0).unwrap();
    }
    assert!(matches!(
        session.finish().unwrap_err(),
        BuildError::Pairing { op: "if_", .. }
    ));
}

// ── Test 3: while / let / assert / attr ───────────────────────────────────

#[test]
fn test_while_let_assert_attr() {
    let session = IRBuilder::enter().unwrap();
    let v = Var::new("v", DataType::int(32));
    {
        let _w = tir::while_(PrimExpr::from(&v).less_than(4)).unwrap();
        let bound = tir::let_(v.clone(), 3).unwrap();
        assert_eq!(bound.var(), &v);
        let _a = tir::assert_(PrimExpr::from(&v).equal(3), "v must be 3").unwrap();
        let _attr = tir::attr("pragma", "pragma_import_c", PrimExpr::string("x.c")).unwrap();
        tir::evaluate(&v).unwrap();
    }
    let stmt = session.finish().unwrap().into_stmt().unwrap();

    let Stmt::While { body, .. } = stmt else { panic!("expected while") };
    let Stmt::LetStmt { var, value, body } = *body else { panic!("expected let") };
    assert_eq!(var, v);
    assert_eq!(value, PrimExpr::int(3));
    let Stmt::AssertStmt { message, body, .. } = *body else { panic!("expected assert") };
    assert_eq!(message, PrimExpr::string("v must be 3"));
    let Stmt::AttrStmt { node, key, body, .. } = *body else { panic!("expected attr") };
    assert_eq!(node, AttrNode::Str("pragma".into()));
    assert_eq!(key, "pragma_import_c");
    assert_eq!(*body, Stmt::Evaluate(PrimExpr::Var(v)));
}

// ── Test 4: env_thread / launch_thread ────────────────────────────────────

#[test]
fn test_launch_thread_round_trip() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let tx = tir::env_thread("threadIdx.x").unwrap();
        let launched = tir::launch_thread(&tx, 128).unwrap();
        assert_eq!(launched.var(), &tx);
        tir::evaluate(&tx).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    let Stmt::AttrStmt { node, key, value, .. } = &func.body else {
        panic!("expected attr, got {:?}", func.body);
    };
    assert_eq!(key, "thread_extent");
    assert_eq!(*value, PrimExpr::int(128));
    let AttrNode::IterVar(iv) = node else { panic!("expected iter var node") };
    assert_eq!(iv.kind, IterVarKind::ThreadIndex);
    assert_eq!(iv.thread_tag, "threadIdx.x");
    assert_eq!(iv.dom.as_ref().map(|d| d.extent.clone()), Some(PrimExpr::int(128)));
}

#[test]
fn test_launch_unknown_thread() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let stray = Var::new("threadIdx.y", DataType::int(32));
    let err = tir::launch_thread(&stray, 4).unwrap_err();
    assert!(matches!(err, BuildError::UnknownEnvThread { .. }));
}

#[test]
fn test_env_thread_needs_function() {
    let _session = IRBuilder::enter().unwrap();
    let err = tir::env_thread("blockIdx.x").unwrap_err();
    assert_eq!(
        err,
        BuildError::NoEnclosingScope {
            op: "env_thread",
            expected: FrameKind::PrimFunc,
        }
    );
}

// ── Test 5: realize ───────────────────────────────────────────────────────

#[test]
fn test_realize_declared_buffer() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let a = tir::arg_buffer(
            "A",
            tir::buffer_decl([8], DataType::float(32), BufferOptions::new()).unwrap(),
        )
        .unwrap();
        let _r = tir::realize(a.slice(vec![Range::new(0, 4)]), "", None).unwrap();
        tir::evaluate(0).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    let Stmt::AttrStmt { key, value, body, .. } = &func.body else {
        panic!("expected attr");
    };
    assert_eq!(key, "realize_scope");
    assert_eq!(*value, PrimExpr::string("global"));
    assert!(matches!(**body, Stmt::BufferRealize { .. }));
}

#[test]
fn test_realize_scope_from_attr() {
    let session = IRBuilder::enter().unwrap();
    {
        let _f = tir::prim_func().unwrap();
        let a = tir::arg_buffer(
            "A",
            tir::buffer_decl([8], DataType::float(32), BufferOptions::new()).unwrap(),
        )
        .unwrap();
        let _s = tir::attr(a.data.clone(), "storage_scope", PrimExpr::string("shared")).unwrap();
        let _r = tir::realize(a.full_region(), "", None).unwrap();
    }
    let func = session.finish().unwrap().into_func().unwrap();
    let Stmt::AttrStmt { body, .. } = &func.body else { panic!("expected attr") };
    let Stmt::AttrStmt { key, value, .. } = &**body else { panic!("expected attr") };
    assert_eq!(key, "realize_scope");
    assert_eq!(*value, PrimExpr::string("shared"));
}

#[test]
fn test_realize_undeclared_buffer() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let stray = tir::buffer_decl([8], DataType::float(32), BufferOptions::new().name("stray")).unwrap();
    let err = tir::realize(stray.full_region(), "", None).unwrap_err();
    assert_eq!(
        err,
        BuildError::UndeclaredBuffer {
            op: "realize",
            buffer: "stray".into(),
        }
    );
}

#[test]
fn test_realize_rank_mismatch() {
    let _session = IRBuilder::enter().unwrap();
    let _f = tir::prim_func().unwrap();
    let a = tir::buffer_decl([8, 8], DataType::float(32), BufferOptions::new()).unwrap();
    let err = tir::realize(a.slice(vec![Range::new(0, 8)]), "", None).unwrap_err();
    assert!(matches!(err, BuildError::ArgumentShape { op: "realize", .. }));
}
