use thiserror::Error;

use crate::approvals::FlowError;
use crate::config::ConfigError;
use crate::matrix::MatrixError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<MatrixError> for ApplicationError {
    fn from(value: MatrixError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("request not routable: {message}")]
    NotRoutable { message: String, correlation_id: String },
    #[error("unknown reference: {message}")]
    UnknownReference { message: String, correlation_id: String },
    #[error("approval gap: {message}")]
    ApprovalGap { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotRoutable { .. } => {
                "No approval rule covers this request. Ask an administrator to add a matching rule."
            }
            Self::UnknownReference { .. } => {
                "The requesting organization is not registered. Fix the organization data and try again."
            }
            Self::ApprovalGap { .. } => {
                "Some required approvers could not be found. Assign the missing roles before submitting."
            }
            Self::ServiceUnavailable { .. } => {
                "The organization directory could not be reached. Check connectivity and retry."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotRoutable { correlation_id, .. }
            | Self::UnknownReference { correlation_id, .. }
            | Self::ApprovalGap { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotRoutable { correlation_id: id, .. }
            | InterfaceError::UnknownReference { correlation_id: id, .. }
            | InterfaceError::ApprovalGap { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Flow(error) => {
                let message = error.to_string();
                match error {
                    FlowError::InvalidRequest(_) => Self::BadRequest { message, correlation_id },
                    FlowError::NoMatchingRule { .. } => Self::NotRoutable { message, correlation_id },
                    FlowError::OrganizationNotFound(_) => {
                        Self::UnknownReference { message, correlation_id }
                    }
                    FlowError::UnresolvedRequiredLevels { .. } => {
                        Self::ApprovalGap { message, correlation_id }
                    }
                    FlowError::Lookup(_) => Self::ServiceUnavailable { message, correlation_id },
                }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::approvals::FlowError;
    use crate::directory::DirectoryError;
    use crate::domain::organization::OrganizationId;
    use crate::domain::request::SpendingCategory;
    use crate::errors::{ApplicationError, InterfaceError};
    use crate::matrix::MatrixError;

    #[test]
    fn missing_rule_maps_to_not_routable() {
        let interface = ApplicationError::from(FlowError::NoMatchingRule {
            category: SpendingCategory::Other,
            amount: Decimal::new(10_000, 0),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotRoutable { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.user_message().contains("add a matching rule"));
    }

    #[test]
    fn unknown_organization_maps_to_unknown_reference() {
        let interface = ApplicationError::from(FlowError::OrganizationNotFound(OrganizationId(
            "org-missing".to_owned(),
        )))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::UnknownReference { .. }));
        assert!(interface.to_string().contains("org-missing"));
        assert!(interface.user_message().contains("organization data"));
    }

    #[test]
    fn lookup_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(FlowError::Lookup(DirectoryError::Unavailable(
            "connection reset".to_owned(),
        )))
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
        assert!(interface.user_message().contains("connectivity"));
    }

    #[test]
    fn invalid_matrix_maps_to_internal() {
        let interface =
            ApplicationError::from(MatrixError::Validation("no rules".to_owned())).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
