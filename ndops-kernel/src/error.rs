/// Errors raised while parsing, specializing or running templates.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("parse error in {section} section, line {line}: {message}")]
    Parse {
        section: &'static str,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Strided(#[from] ndops_view::StridedError),

    #[error("unbound identifier `{0}`")]
    UnboundIdentifier(String),

    #[error("`{0}` is declared twice")]
    Redeclared(String),

    #[error("`{0}` cannot be assigned here")]
    NotAssignable(String),

    #[error("array `{0}` used without an index outside the loop body")]
    BareArray(String),

    #[error("{count} indices given for `{name}` of rank {rank}")]
    TooManyIndices {
        name: String,
        count: usize,
        rank: usize,
    },

    #[error("rank {rank} exceeds the supported maximum of {max}")]
    RankLimit { rank: usize, max: usize },

    #[error("`{template}` takes {expected} arguments, found {found}")]
    ArityMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    #[error("operation needs at least one array argument")]
    NoArrayArgument,

    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    #[error("{kind} has no {variant} variant")]
    UnsupportedVariant {
        kind: &'static str,
        variant: &'static str,
    },

    #[error("invalid histogram parameters: {0}")]
    InvalidHistogram(String),

    #[error("unexpected result: expected {expected}")]
    UnexpectedResult { expected: &'static str },
}

/// Convenience alias for `Result<T, KernelError>`.
pub type Result<T> = std::result::Result<T, KernelError>;
