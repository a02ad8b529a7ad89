/// Convenience result type used across Tessera.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum TesseraError {
    /// Invalid user-provided graph description data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while compiling a graph description into operations.
    #[error("compile error: {0}")]
    Compile(String),

    /// Errors while setting up execution resources.
    #[error("execution error: {0}")]
    Execution(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Build a [`TesseraError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TesseraError::Compile`] value.
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Build a [`TesseraError::Execution`] value.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_their_category() {
        assert_eq!(
            TesseraError::validation("bad canvas").to_string(),
            "validation error: bad canvas"
        );
        assert_eq!(
            TesseraError::compile("cycle").to_string(),
            "compile error: cycle"
        );
        assert_eq!(
            TesseraError::execution("no pool").to_string(),
            "execution error: no pool"
        );
    }

    #[test]
    fn anyhow_errors_pass_through_transparently() {
        let err: TesseraError = anyhow::anyhow!("backend exploded").into();
        assert_eq!(err.to_string(), "backend exploded");
    }
}
