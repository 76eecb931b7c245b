use std::fmt;

/// Type code of a scalar (or vector) element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeCode {
    Int,
    UInt,
    Float,
    /// Opaque pointer-sized handle. `bits == 0` denotes `void`.
    Handle,
}

/// Runtime data type: type code, bit width and vector lane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataType {
    pub code: TypeCode,
    pub bits: u8,
    pub lanes: u16,
}

impl DataType {
    pub const fn new(code: TypeCode, bits: u8, lanes: u16) -> Self {
        Self { code, bits, lanes }
    }

    pub const fn int(bits: u8) -> Self {
        Self::new(TypeCode::Int, bits, 1)
    }

    pub const fn uint(bits: u8) -> Self {
        Self::new(TypeCode::UInt, bits, 1)
    }

    pub const fn float(bits: u8) -> Self {
        Self::new(TypeCode::Float, bits, 1)
    }

    /// Booleans are one-bit unsigned integers.
    pub const fn bool() -> Self {
        Self::new(TypeCode::UInt, 1, 1)
    }

    pub const fn handle() -> Self {
        Self::new(TypeCode::Handle, 64, 1)
    }

    pub const fn void() -> Self {
        Self::new(TypeCode::Handle, 0, 0)
    }

    /// Same element type with a different lane count.
    pub const fn with_lanes(self, lanes: u16) -> Self {
        Self::new(self.code, self.bits, lanes)
    }

    pub fn is_int(&self) -> bool {
        self.code == TypeCode::Int
    }

    pub fn is_bool(&self) -> bool {
        self.code == TypeCode::UInt && self.bits == 1
    }

    pub fn is_handle(&self) -> bool {
        self.code == TypeCode::Handle && self.bits != 0
    }

    pub fn is_void(&self) -> bool {
        self.code == TypeCode::Handle && self.bits == 0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            return f.write_str("void");
        }
        if self.is_bool() {
            f.write_str("bool")?;
        } else {
            match self.code {
                TypeCode::Int => write!(f, "int{}", self.bits)?,
                TypeCode::UInt => write!(f, "uint{}", self.bits)?,
                TypeCode::Float => write!(f, "float{}", self.bits)?,
                TypeCode::Handle => f.write_str("handle")?,
            }
        }
        if self.lanes > 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

/// Static type of a value, as used for function return types and
/// pointer annotations on variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Prim(DataType),
    /// Pointer to `elem` living in the named storage scope.
    Pointer { elem: DataType, storage_scope: String },
    /// The empty tuple is the unit/void type.
    Tuple(Vec<Type>),
}

impl Type {
    pub fn void() -> Self {
        Type::Tuple(Vec::new())
    }

    pub fn pointer(elem: DataType, storage_scope: impl Into<String>) -> Self {
        Type::Pointer {
            elem,
            storage_scope: storage_scope.into(),
        }
    }

    /// Storage scope of a pointer type; `None` for anything else.
    pub fn storage_scope(&self) -> Option<&str> {
        match self {
            Type::Pointer { storage_scope, .. } => Some(storage_scope),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(dtype) => write!(f, "{}", dtype),
            Type::Pointer {
                elem,
                storage_scope,
            } => write!(f, "ptr<{}, \"{}\">", elem, storage_scope),
            Type::Tuple(elems) => {
                f.write_str("(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                f.write_str(")")
            }
        }
    }
}
