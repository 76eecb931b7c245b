use crate::ir::types::DataType;

/// Options for one builder session.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Scope used when an allocation or realization names none and no
    /// enclosing `storage_scope` attribute applies.
    pub default_storage_scope: String,
    /// Dtype of loop variables created for integer-literal bounds.
    pub index_dtype: DataType,
    /// Name of the implicit block that holds function-level allocations.
    pub root_block_name: String,
    /// Alignment applied to buffers allocated or matched inside the session
    /// when the caller leaves `align` unset.
    pub alloc_alignment: i64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            default_storage_scope: "global".to_owned(),
            index_dtype: DataType::int(32),
            root_block_name: "root".to_owned(),
            alloc_alignment: 64,
        }
    }
}

impl BuilderConfig {
    pub fn with_default_storage_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_storage_scope = scope.into();
        self
    }

    pub fn with_index_dtype(mut self, dtype: DataType) -> Self {
        self.index_dtype = dtype;
        self
    }

    pub fn with_root_block_name(mut self, name: impl Into<String>) -> Self {
        self.root_block_name = name.into();
        self
    }

    pub fn with_alloc_alignment(mut self, align: i64) -> Self {
        self.alloc_alignment = align;
        self
    }
}
