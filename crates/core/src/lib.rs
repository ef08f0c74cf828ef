pub mod approvals;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod hierarchy;
pub mod matrix;

pub use approvals::{ApprovalFlowGenerator, FlowError, FlowSettings, MissingApproverPolicy};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use directory::{
    find_approver_in_organization, DirectoryError, InMemoryOrganizationDirectory,
    OrganizationDirectory,
};
pub use domain::approval::{
    ApprovalFlowPreview, ApprovalStatus, ApprovalStep, StepResolution, UnresolvedLevel,
};
pub use domain::organization::{
    ApproverCandidate, OrganizationId, OrganizationNode, OrganizationPath, PersonId,
};
pub use domain::request::{RequestPriority, SpendingCategory, SpendingRequest};
pub use errors::{ApplicationError, InterfaceError};
pub use hierarchy::{resolve_ancestor_path, HierarchyDiagnostic, HierarchyError, ResolvedPath};
pub use matrix::{
    normalize_role, ApprovalLevel, ApprovalMatrix, ApprovalMatrixRule, EscalationPolicy,
    MatrixError, TargetScope,
};
