use peering_api::ProviderKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PeeringError>;

/// Failure reported by a provider SDK call
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{}{message}", .code.as_ref().map(|code| format!("{}: ", code)).unwrap_or_default())]
pub struct TransportError {
    /// Provider error code, e.g. `InvalidPermission.Duplicate` or `notFound`
    pub code: Option<String>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

#[derive(Error, Debug)]
pub enum PeeringError {
    #[error("source [{source_cidr}] and target [{target_cidr}] CIDR Blocks must not overlap")]
    CidrOverlap {
        source_cidr: String,
        target_cidr: String,
    },

    #[error("invalid CIDR block {cidr:?}: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("{resource} not found for {id}")]
    NotFound { resource: String, id: String },

    #[error("expecting exactly 1 {resource}, got {count}")]
    Cardinality { resource: String, count: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{operation} did not succeed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<PeeringError>,
    },

    #[error("only {expected} clients are supported, got {actual}")]
    ProviderMismatch {
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error("VPC peering is not supported on {0}")]
    Unsupported(ProviderKind),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PeeringError>,
    },
}

/// Coarse classification of a possibly wrapped error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Cardinality,
    Transport,
    ExhaustedRetries,
    Unsupported,
}

impl PeeringError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn cardinality(resource: impl Into<String>, count: usize) -> Self {
        Self::Cardinality {
            resource: resource.into(),
            count,
        }
    }

    /// Wrap this error with a step-identifying prefix
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error below any step context
    pub fn root(&self) -> &PeeringError {
        match self {
            PeeringError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PeeringError::CidrOverlap { .. } | PeeringError::InvalidCidr { .. } => ErrorKind::Validation,
            PeeringError::NotFound { .. } => ErrorKind::NotFound,
            PeeringError::Cardinality { .. } => ErrorKind::Cardinality,
            PeeringError::Transport(_) => ErrorKind::Transport,
            PeeringError::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            PeeringError::ProviderMismatch { .. } | PeeringError::Unsupported(_) => ErrorKind::Unsupported,
            PeeringError::Context { source, .. } => source.kind(),
        }
    }
}

/// Step-context wrapping for results, in the spirit of `anyhow::Context`
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PeeringError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
