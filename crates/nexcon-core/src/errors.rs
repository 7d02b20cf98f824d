use nexcon_core_types::RequestId;
use thiserror::Error;

/// Result type alias using NexconError
pub type Result<T> = std::result::Result<T, NexconError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Stable classification of every failure the core can surface. Each kind maps
/// to a stable code that UI handlers and the CLI can match on without parsing
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    InvalidName,
    NotFound,
    AlreadyExists,
    WrongNodeKind,

    // Dependency graph
    DanglingReference,
    NotOwner,
    HasDependents,
    CycleDetected,
    InvariantViolation,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidName => "ERR_INVALID_NAME",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::WrongNodeKind => "ERR_WRONG_NODE_KIND",
            ExErrorKind::DanglingReference => "ERR_DANGLING_REFERENCE",
            ExErrorKind::NotOwner => "ERR_NOT_OWNER",
            ExErrorKind::HasDependents => "ERR_HAS_DEPENDENTS",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification plus the context a UI needs to present the failure:
/// which operation, which node, and (for dependency failures) who is in the way.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_path: Option<String>,
    target_path: Option<String>,
    dependents: Vec<String>,
    request_id: Option<RequestId>,
    message: String,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_path: None,
            target_path: None,
            dependents: Vec::new(),
            request_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the path of the node the operation acted on
    pub fn with_entity_path(mut self, path: impl Into<String>) -> Self {
        self.entity_path = Some(path.into());
        self
    }

    /// Add the path of the node being referenced
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    /// Add the paths of entities that still depend on the entity
    pub fn with_dependents(mut self, dependents: Vec<String>) -> Self {
        self.dependents = dependents;
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(path) = &self.entity_path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(target) = &self.target_path {
            write!(f, " (target: {})", target)?;
        }
        if !self.dependents.is_empty() {
            write!(f, " (dependents: {})", self.dependents.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for store, model and instrument operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NexconError {
    // ===== Store Errors =====
    /// No node exists at the given absolute path
    #[error("Node not found: {path}")]
    NodeNotFound { path: String },

    /// A handle refers to a node that has been deleted
    #[error("Node {node_id} no longer exists")]
    UnknownNode { node_id: u64 },

    /// A sibling with the same name already exists
    #[error("Node already exists: {path}")]
    NodeAlreadyExists { path: String },

    /// Children can only be created under groups
    #[error("Node {path} is a dataset and cannot hold children")]
    NotAGroup { path: String },

    /// Node name is empty, contains '/', or is a relative path token
    #[error("Invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The node exists but is not the expected kind (component, transform, ...)
    #[error("Node {path} is not a {expected}")]
    WrongNodeKind { path: String, expected: String },

    // ===== Dependency Errors =====
    /// A depends_on value points at a node that does not exist
    #[error("depends_on of {owner} points to missing node {target}")]
    DanglingReference { owner: String, target: String },

    /// A component tried to remove a transform belonging to another component
    #[error("Transform {transform} is not owned by component {component}")]
    NotOwner { transform: String, component: String },

    /// The entity is still the target of other depends_on pointers
    #[error("Cannot remove {path}: still depended on by {}", dependents.join(", "))]
    HasDependents {
        path: String,
        dependents: Vec<String>,
    },

    /// Following depends_on would revisit a node
    #[error("Cycle detected in depends_on chain at {path}")]
    CycleDetected { path: String },

    // ===== Validation Errors =====
    /// Translation vectors must have non-zero length
    #[error("Translation vector must have non-zero length")]
    ZeroLengthVector,

    /// A stored attribute or field has an unexpected type or value
    #[error("Invalid value for '{name}' on {path}: {reason}")]
    InvalidValue {
        path: String,
        name: String,
        reason: String,
    },

    /// A document-level invariant does not hold
    #[error("Invariant violated: {reason}")]
    InvariantViolation { reason: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON/YAML encoding or decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for NexconError {
    fn from(err: serde_json::Error) -> Self {
        NexconError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from NexconError to the structured facility
impl From<NexconError> for ExError {
    fn from(err: NexconError) -> Self {
        let message = err.to_string();
        match err {
            NexconError::NodeNotFound { path } => ExError::new(ExErrorKind::NotFound)
                .with_entity_path(path)
                .with_message(message),

            NexconError::UnknownNode { .. } => {
                ExError::new(ExErrorKind::NotFound).with_message(message)
            }

            NexconError::NodeAlreadyExists { path } => ExError::new(ExErrorKind::AlreadyExists)
                .with_entity_path(path)
                .with_message(message),

            NexconError::NotAGroup { path } => ExError::new(ExErrorKind::WrongNodeKind)
                .with_entity_path(path)
                .with_message(message),

            NexconError::InvalidName { .. } => {
                ExError::new(ExErrorKind::InvalidName).with_message(message)
            }

            NexconError::WrongNodeKind { path, .. } => ExError::new(ExErrorKind::WrongNodeKind)
                .with_entity_path(path)
                .with_message(message),

            NexconError::DanglingReference { owner, target } => {
                ExError::new(ExErrorKind::DanglingReference)
                    .with_entity_path(owner)
                    .with_target_path(target)
                    .with_message(message)
            }

            NexconError::NotOwner {
                transform,
                component,
            } => ExError::new(ExErrorKind::NotOwner)
                .with_op("remove_transformation")
                .with_entity_path(transform)
                .with_target_path(component)
                .with_message(message),

            NexconError::HasDependents { path, dependents } => {
                ExError::new(ExErrorKind::HasDependents)
                    .with_entity_path(path)
                    .with_dependents(dependents)
                    .with_message(message)
            }

            NexconError::CycleDetected { path } => ExError::new(ExErrorKind::CycleDetected)
                .with_entity_path(path)
                .with_message(message),

            NexconError::ZeroLengthVector => ExError::new(ExErrorKind::InvalidInput)
                .with_op("add_translation")
                .with_message(message),

            NexconError::InvalidValue { path, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_path(path)
                .with_message(message),

            NexconError::InvariantViolation { .. } => {
                ExError::new(ExErrorKind::InvariantViolation).with_message(message)
            }

            NexconError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            NexconError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<&NexconError> for ExError {
    fn from(err: &NexconError) -> Self {
        ExError::from(err.clone())
    }
}
