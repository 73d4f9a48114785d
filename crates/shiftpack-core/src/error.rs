use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("release '{release}' references unknown package '{package}'")]
    UnknownPackage { release: String, package: String },

    #[error("release '{release}' declares package '{package}' more than once")]
    DuplicatePackage { release: String, package: String },

    #[error("release '{0}' is declared more than once")]
    DuplicateRelease(String),

    #[error("release '{release}' has a dependency cycle: {}", cycle.join(" -> "))]
    CyclicDependency { release: String, cycle: Vec<String> },

    #[error(
        "dependency resolution for '{package}' in release '{release}' exceeded depth {limit}"
    )]
    ResolutionDepthExceeded {
        release: String,
        package: String,
        limit: usize,
    },

    #[error("package '{0}' is hidden and cannot be installed directly")]
    NotInstallable(String),

    #[error("package '{0}' is not installed")]
    NotInstalled(String),

    #[error("package '{package}' is still required by: {}", dependents.join(", "))]
    PackageInUse {
        package: String,
        dependents: Vec<String>,
    },

    #[error("{operation} failed: {message}")]
    ExternalIo { operation: String, message: String },

    #[error("invalid {kind} payload: {message}")]
    InvalidPayload { kind: &'static str, message: String },

    #[error("install state error: {0}")]
    State(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signature verification failed for '{resource}': {message}")]
    Signature { resource: String, message: String },
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wraps a collaborator failure, keeping its whole context chain.
    pub fn external(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::ExternalIo {
            operation: operation.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn invalid_payload(kind: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            kind,
            message: err.to_string(),
        }
    }
}
