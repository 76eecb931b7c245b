//! Structural equality and hashing of finished functions.
//!
//! Two functions are structurally equal when they have the same shape
//! modulo variable identity: variables are numbered in order of first
//! occurrence, and variable and buffer names are ignored. Block names,
//! string literals and annotation keys are significant.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::ir::buffer::{Buffer, BufferRegion, ConstantData};
use crate::ir::expr::{AttrValue, Annotations, IterVar, PrimExpr, Range, Var, VarId};
use crate::ir::function::PrimFunc;
use crate::ir::stmt::{AttrNode, Block, Stmt};
use crate::ir::types::{DataType, Type};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    Tag(&'static str),
    Len(usize),
    Int(i64),
    Float(u64),
    Str(String),
    DType(DataType),
    Var(usize),
}

/// Canonical fingerprint of a `PrimFunc`. Use it as a map key to
/// deduplicate structurally identical functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralKey(Vec<Token>);

impl StructuralKey {
    pub fn of(func: &PrimFunc) -> Self {
        let mut enc = Encoder::default();
        enc.func(func);
        StructuralKey(enc.tokens)
    }

    /// 64-bit hash of the key, stable within one process.
    pub fn hash64(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

pub fn structural_equal(a: &PrimFunc, b: &PrimFunc) -> bool {
    StructuralKey::of(a) == StructuralKey::of(b)
}

pub fn structural_hash(func: &PrimFunc) -> u64 {
    StructuralKey::of(func).hash64()
}

#[derive(Default)]
struct Encoder {
    tokens: Vec<Token>,
    vars: HashMap<VarId, usize>,
}

impl Encoder {
    fn tag(&mut self, tag: &'static str) {
        self.tokens.push(Token::Tag(tag));
    }

    fn len(&mut self, n: usize) {
        self.tokens.push(Token::Len(n));
    }

    fn string(&mut self, s: &str) {
        self.tokens.push(Token::Str(s.to_owned()));
    }

    fn var(&mut self, var: &Var) {
        let next = self.vars.len();
        let index = *self.vars.entry(var.id).or_insert(next);
        self.tokens.push(Token::Var(index));
        self.tokens.push(Token::DType(var.dtype));
        if let Some(ty) = &var.type_annotation {
            self.ty(ty);
        }
    }

    fn ty(&mut self, ty: &Type) {
        match ty {
            Type::Prim(dtype) => {
                self.tag("prim");
                self.tokens.push(Token::DType(*dtype));
            }
            Type::Pointer {
                elem,
                storage_scope,
            } => {
                self.tag("ptr");
                self.tokens.push(Token::DType(*elem));
                self.string(storage_scope);
            }
            Type::Tuple(elems) => {
                self.tag("tuple");
                self.len(elems.len());
                for elem in elems {
                    self.ty(elem);
                }
            }
        }
    }

    fn exprs(&mut self, exprs: &[PrimExpr]) {
        self.len(exprs.len());
        for e in exprs {
            self.expr(e);
        }
    }

    fn expr(&mut self, expr: &PrimExpr) {
        match expr {
            PrimExpr::IntImm { value, dtype } => {
                self.tag("int");
                self.tokens.push(Token::Int(*value));
                self.tokens.push(Token::DType(*dtype));
            }
            PrimExpr::FloatImm { value, dtype } => {
                self.tag("float");
                self.tokens.push(Token::Float(value.to_bits()));
                self.tokens.push(Token::DType(*dtype));
            }
            PrimExpr::StringImm(s) => {
                self.tag("str");
                self.string(s);
            }
            PrimExpr::Var(var) => self.var(var),
            PrimExpr::Binary { op, lhs, rhs } => {
                self.tag("bin");
                self.string(&op.to_string());
                self.expr(lhs);
                self.expr(rhs);
            }
            PrimExpr::Not(value) => {
                self.tag("not");
                self.expr(value);
            }
            PrimExpr::Cast { dtype, value } => {
                self.tag("cast");
                self.tokens.push(Token::DType(*dtype));
                self.expr(value);
            }
            PrimExpr::BufferLoad { buffer, indices } => {
                self.tag("load");
                self.buffer(buffer);
                self.exprs(indices);
            }
            PrimExpr::Call { op, args, dtype } => {
                self.tag("call");
                self.string(op);
                self.tokens.push(Token::DType(*dtype));
                self.exprs(args);
            }
        }
    }

    fn range(&mut self, range: &Range) {
        self.expr(&range.min);
        self.expr(&range.extent);
    }

    fn iter_var(&mut self, iv: &IterVar) {
        self.tag("iter_var");
        match &iv.dom {
            Some(dom) => self.range(dom),
            None => self.tag("no_dom"),
        }
        self.var(&iv.var);
        self.string(&iv.kind.to_string());
        self.string(&iv.thread_tag);
    }

    fn buffer(&mut self, buffer: &Buffer) {
        self.tag("buffer");
        self.var(&buffer.data);
        self.tokens.push(Token::DType(buffer.dtype));
        self.exprs(&buffer.shape);
        self.exprs(&buffer.strides);
        self.expr(&buffer.elem_offset);
        self.tokens.push(Token::Int(buffer.data_alignment));
        self.tokens.push(Token::Int(buffer.offset_factor));
        self.string(&buffer.buffer_type.to_string());
        self.len(buffer.axis_separators.len());
        for sep in &buffer.axis_separators {
            self.tokens.push(Token::Int(*sep));
        }
    }

    fn region(&mut self, region: &BufferRegion) {
        self.buffer(&region.buffer);
        self.len(region.region.len());
        for range in &region.region {
            self.range(range);
        }
    }

    fn attr_value(&mut self, value: &AttrValue) {
        match value {
            AttrValue::Int(v) => {
                self.tag("a_int");
                self.tokens.push(Token::Int(*v));
            }
            AttrValue::Float(v) => {
                self.tag("a_float");
                self.tokens.push(Token::Float(v.to_bits()));
            }
            AttrValue::Bool(v) => {
                self.tag("a_bool");
                self.tokens.push(Token::Int(*v as i64));
            }
            AttrValue::Str(s) => {
                self.tag("a_str");
                self.string(s);
            }
            AttrValue::Expr(e) => {
                self.tag("a_expr");
                self.expr(e);
            }
            AttrValue::Array(items) => {
                self.tag("a_array");
                self.len(items.len());
                for item in items {
                    self.attr_value(item);
                }
            }
        }
    }

    fn annotations(&mut self, annotations: &Annotations) {
        self.len(annotations.len());
        for (key, value) in annotations {
            self.string(key);
            self.attr_value(value);
        }
    }

    fn block(&mut self, block: &Block) {
        self.tag("block");
        self.string(&block.name);
        self.len(block.iter_vars.len());
        for iv in &block.iter_vars {
            self.iter_var(iv);
        }
        for regions in [&block.reads, &block.writes] {
            self.len(regions.len());
            for region in regions {
                self.region(region);
            }
        }
        self.len(block.alloc_buffers.len());
        for buffer in &block.alloc_buffers {
            self.buffer(buffer);
        }
        self.len(block.match_buffers.len());
        for mb in &block.match_buffers {
            self.buffer(&mb.buffer);
            self.region(&mb.source);
        }
        self.annotations(&block.annotations);
        match &block.init {
            Some(init) => self.stmt(init),
            None => self.tag("no_init"),
        }
        self.stmt(&block.body);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.tag(stmt.kind_name());
        match stmt {
            Stmt::Seq(stmts) => {
                self.len(stmts.len());
                for s in stmts {
                    self.stmt(s);
                }
            }
            Stmt::For(f) => {
                self.var(&f.loop_var);
                self.expr(&f.min);
                self.expr(&f.extent);
                self.string(&f.kind.to_string());
                match &f.thread_binding {
                    Some(iv) => self.iter_var(iv),
                    None => self.tag("unbound"),
                }
                self.annotations(&f.annotations);
                self.stmt(&f.body);
            }
            Stmt::Block(block) => self.block(block),
            Stmt::BlockRealize(realize) => {
                self.exprs(&realize.iter_values);
                self.expr(&realize.predicate);
                self.block(&realize.block);
            }
            Stmt::IfThenElse {
                condition,
                then_case,
                else_case,
            } => {
                self.expr(condition);
                self.stmt(then_case);
                match else_case {
                    Some(else_case) => self.stmt(else_case),
                    None => self.tag("no_else"),
                }
            }
            Stmt::While { condition, body } => {
                self.expr(condition);
                self.stmt(body);
            }
            Stmt::LetStmt { var, value, body } => {
                self.var(var);
                self.expr(value);
                self.stmt(body);
            }
            Stmt::Allocate {
                buffer_var,
                dtype,
                extents,
                condition,
                body,
                annotations,
            } => {
                self.var(buffer_var);
                self.tokens.push(Token::DType(*dtype));
                self.exprs(extents);
                self.expr(condition);
                self.annotations(annotations);
                self.stmt(body);
            }
            Stmt::AllocateConst {
                buffer_var,
                dtype,
                extents,
                data,
                body,
                annotations,
            } => {
                self.var(buffer_var);
                self.tokens.push(Token::DType(*dtype));
                self.exprs(extents);
                match data {
                    ConstantData::Int(values) => {
                        self.len(values.len());
                        self.tokens.extend(values.iter().map(|v| Token::Int(*v)));
                    }
                    ConstantData::Float(values) => {
                        self.len(values.len());
                        self.tokens.extend(values.iter().map(|v| Token::Float(v.to_bits())));
                    }
                }
                self.annotations(annotations);
                self.stmt(body);
            }
            Stmt::AttrStmt {
                node,
                key,
                value,
                body,
            } => {
                match node {
                    AttrNode::Var(var) => self.var(var),
                    AttrNode::IterVar(iv) => self.iter_var(iv),
                    AttrNode::Buffer(buffer) => self.buffer(buffer),
                    AttrNode::Str(s) => self.string(s),
                }
                self.string(key);
                self.expr(value);
                self.stmt(body);
            }
            Stmt::AssertStmt {
                condition,
                message,
                body,
            } => {
                self.expr(condition);
                self.expr(message);
                self.stmt(body);
            }
            Stmt::BufferStore {
                buffer,
                value,
                indices,
            } => {
                self.buffer(buffer);
                self.expr(value);
                self.exprs(indices);
            }
            Stmt::BufferRealize {
                region,
                condition,
                body,
            } => {
                self.region(region);
                self.expr(condition);
                self.stmt(body);
            }
            Stmt::Prefetch { buffer, bounds } => {
                self.buffer(buffer);
                self.len(bounds.len());
                for range in bounds {
                    self.range(range);
                }
            }
            Stmt::Evaluate(value) => self.expr(value),
        }
    }

    fn func(&mut self, func: &PrimFunc) {
        self.tag("prim_func");
        self.len(func.params.len());
        for param in &func.params {
            self.var(param);
        }
        for map in [&func.buffer_map, &func.preflattened_buffer_map] {
            self.len(map.len());
            for (param, buffer) in map {
                self.var(param);
                self.buffer(buffer);
            }
        }
        self.ty(&func.ret_type);
        self.annotations(&func.attrs);
        self.stmt(&func.body);
    }
}
