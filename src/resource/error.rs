/// Errors that can occur during resource pool operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The pool has no free block of the requested size
    #[error("pool '{pool}' exhausted: no free block for {size}")]
    Exhausted { pool: String, size: String },

    /// A pool with the same identity was declared with an incompatible space
    #[error("pool '{pool}' already declared as {existing}, cannot redeclare as {requested}")]
    Conflict {
        pool: String,
        existing: String,
        requested: String,
    },

    /// No allocation exists for the key
    #[error("no allocation for key '{key}' in pool '{pool}'")]
    NotFound { pool: String, key: String },

    #[error("pool not found: {0}")]
    PoolNotFound(String),

    /// The request does not fit the pool kind or bounds
    #[error("invalid request for pool '{pool}': {message}")]
    InvalidRequest { pool: String, message: String },
}

impl ResourceError {
    /// True when the error only reports an absent allocation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }
}
