//! Strongly typed identifiers

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "Uuid", into = "Uuid")]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID, rejecting the nil value
            pub fn from_uuid(value: Uuid) -> Result<Self, DomainError> {
                if value.is_nil() {
                    return Err(DomainError::validation(concat!(
                        stringify!($name),
                        " must not be nil"
                    )));
                }
                Ok(Self(value))
            }

            /// Parse from the canonical string form
            pub fn parse(value: &str) -> Result<Self, DomainError> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::validation(concat!(
                        stringify!($name),
                        " must not be empty"
                    )));
                }
                let uuid = Uuid::parse_str(trimmed).map_err(|e| {
                    DomainError::validation(format!(
                        "{} is not a valid id: {}",
                        stringify!($name),
                        e
                    ))
                })?;
                Self::from_uuid(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl TryFrom<Uuid> for $name {
            type Error = DomainError;

            fn try_from(value: Uuid) -> Result<Self, Self::Error> {
                Self::from_uuid(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(
    /// Identity of a single-stack `Deployment`
    DeploymentId
);
define_id!(
    /// Identity of a `ProductDeployment`
    ProductDeploymentId
);
define_id!(
    /// Identity of the execution environment a deployment targets
    EnvironmentId
);
define_id!(
    /// Identity of the user who triggered an operation
    UserId
);
