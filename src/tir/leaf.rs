//! Stateless constructors: buffer declarations, pointers and dtype helpers.

use crate::error::BuildError;
use crate::ir::buffer::{Buffer, BufferType};
use crate::ir::expr::{PrimExpr, Var};
use crate::ir::types::DataType;

/// Optional fields of a buffer declaration.
#[derive(Debug, Clone)]
pub struct BufferOptions {
    pub name: String,
    /// Backing pointer; a fresh one is created when unset.
    pub data: Option<Var>,
    pub strides: Vec<PrimExpr>,
    pub elem_offset: Option<PrimExpr>,
    pub storage_scope: String,
    /// `<= 0` selects the default alignment.
    pub align: i64,
    pub offset_factor: i64,
    pub buffer_type: String,
    pub axis_separators: Vec<i64>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            name: "buffer".to_owned(),
            data: None,
            strides: Vec::new(),
            elem_offset: None,
            storage_scope: "global".to_owned(),
            align: -1,
            offset_factor: 0,
            buffer_type: "default".to_owned(),
            axis_separators: Vec::new(),
        }
    }
}

impl BufferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn data(mut self, data: Var) -> Self {
        self.data = Some(data);
        self
    }

    pub fn strides(mut self, strides: Vec<PrimExpr>) -> Self {
        self.strides = strides;
        self
    }

    pub fn elem_offset(mut self, elem_offset: impl Into<PrimExpr>) -> Self {
        self.elem_offset = Some(elem_offset.into());
        self
    }

    pub fn storage_scope(mut self, scope: impl Into<String>) -> Self {
        self.storage_scope = scope.into();
        self
    }

    pub fn align(mut self, align: i64) -> Self {
        self.align = align;
        self
    }

    pub fn offset_factor(mut self, factor: i64) -> Self {
        self.offset_factor = factor;
        self
    }

    pub fn buffer_type(mut self, buffer_type: impl Into<String>) -> Self {
        self.buffer_type = buffer_type.into();
        self
    }

    pub fn axis_separators(mut self, separators: Vec<i64>) -> Self {
        self.axis_separators = separators;
        self
    }
}

const DEFAULT_ALIGN: i64 = 64;

/// Declares a buffer of `shape` and `dtype`. Needs no active builder.
pub fn buffer_decl<S: Into<PrimExpr>>(
    shape: impl IntoIterator<Item = S>,
    dtype: DataType,
    opts: BufferOptions,
) -> Result<Buffer, BuildError> {
    let shape: Vec<PrimExpr> = shape.into_iter().map(Into::into).collect();
    let ndim = shape.len();

    let buffer_type = BufferType::parse(&opts.buffer_type).ok_or_else(|| {
        BuildError::shape(
            "buffer_decl",
            format!(
                "unknown buffer_type '{}', expected 'default' or 'auto_broadcast'",
                opts.buffer_type
            ),
        )
    })?;
    if !opts.strides.is_empty() && opts.strides.len() != ndim {
        return Err(BuildError::shape(
            "buffer_decl",
            format!("{} strides given for a buffer of rank {}", opts.strides.len(), ndim),
        ));
    }
    let mut prev = 0;
    for &sep in &opts.axis_separators {
        if sep <= prev || sep as usize >= ndim {
            return Err(BuildError::shape(
                "buffer_decl",
                format!(
                    "axis separators {:?} must be strictly increasing and inside 1..{}",
                    opts.axis_separators, ndim
                ),
            ));
        }
        prev = sep;
    }

    let data = opts
        .data
        .unwrap_or_else(|| Var::pointer(opts.name.clone(), dtype, opts.storage_scope.clone()));
    let elem_offset = match opts.elem_offset {
        Some(offset) => offset,
        None if opts.offset_factor != 0 => {
            PrimExpr::Var(Var::new(format!("{}_elem_offset", opts.name), DataType::int(32)))
        }
        None => PrimExpr::int(0),
    };

    Ok(Buffer {
        data,
        dtype,
        shape,
        strides: opts.strides,
        elem_offset,
        name: opts.name,
        data_alignment: if opts.align <= 0 { DEFAULT_ALIGN } else { opts.align },
        offset_factor: if opts.offset_factor == 0 { 1 } else { opts.offset_factor },
        buffer_type,
        axis_separators: opts.axis_separators,
    })
}

/// A fresh handle variable pointing at `dtype` data in `storage_scope`.
pub fn ptr(dtype: DataType, storage_scope: &str) -> PrimExpr {
    PrimExpr::Var(Var::pointer("ptr", dtype, storage_scope))
}

fn cast_or_placeholder(dtype: DataType, value: Option<PrimExpr>) -> PrimExpr {
    match value {
        Some(value) => PrimExpr::cast(dtype, value),
        None => PrimExpr::Var(Var::new("", dtype)),
    }
}

macro_rules! dtype_helpers {
    ($($name:ident => $dtype:expr),* $(,)?) => {
        $(
            #[doc = concat!("Casts `value` to `", stringify!($name), "`, or declares a placeholder variable of that type.")]
            pub fn $name(value: Option<PrimExpr>) -> PrimExpr {
                cast_or_placeholder($dtype, value)
            }
        )*

        /// Every dtype helper by name.
        pub const DTYPE_HELPERS: &[(&str, DataType)] = &[$((stringify!($name), $dtype)),*];
    };
}

dtype_helpers! {
    int8 => DataType::int(8),
    int16 => DataType::int(16),
    int32 => DataType::int(32),
    int64 => DataType::int(64),
    uint8 => DataType::uint(8),
    uint16 => DataType::uint(16),
    uint32 => DataType::uint(32),
    uint64 => DataType::uint(64),
    float8 => DataType::float(8),
    float16 => DataType::float(16),
    float32 => DataType::float(32),
    float64 => DataType::float(64),
    int32x4 => DataType::int(32).with_lanes(4),
    int32x8 => DataType::int(32).with_lanes(8),
    int32x16 => DataType::int(32).with_lanes(16),
    boolean => DataType::bool(),
    handle => DataType::handle(),
    void => DataType::void(),
}
