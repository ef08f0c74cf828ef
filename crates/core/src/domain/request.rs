use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::organization::{OrganizationId, PersonId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingCategory {
    Ministry,
    Supplies,
    Equipment,
    Event,
    Construction,
    Facilities,
    Salary,
    Bonus,
    Benefits,
    Utilities,
    Maintenance,
    Other,
}

impl SpendingCategory {
    pub const ALL: [SpendingCategory; 12] = [
        Self::Ministry,
        Self::Supplies,
        Self::Equipment,
        Self::Event,
        Self::Construction,
        Self::Facilities,
        Self::Salary,
        Self::Bonus,
        Self::Benefits,
        Self::Utilities,
        Self::Maintenance,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ministry => "ministry",
            Self::Supplies => "supplies",
            Self::Equipment => "equipment",
            Self::Event => "event",
            Self::Construction => "construction",
            Self::Facilities => "facilities",
            Self::Salary => "salary",
            Self::Bonus => "bonus",
            Self::Benefits => "benefits",
            Self::Utilities => "utilities",
            Self::Maintenance => "maintenance",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SpendingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for SpendingCategory {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|category| category.as_str() == key).ok_or(UnknownVariant {
            kind: "spending category",
            value: value.to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl FromStr for RequestPriority {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(UnknownVariant { kind: "request priority", value: value.to_string() }),
        }
    }
}

/// A spending request as submitted by a member, prior to routing.
///
/// Callers construct one per preview; the engine never stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingRequest {
    pub requester_id: PersonId,
    pub organization_id: OrganizationId,
    pub amount: Decimal,
    pub category: SpendingCategory,
    pub description: String,
    #[serde(default)]
    pub priority: RequestPriority,
}

impl SpendingRequest {
    pub fn new(
        requester_id: impl Into<String>,
        organization_id: impl Into<String>,
        amount: Decimal,
        category: SpendingCategory,
    ) -> Self {
        Self {
            requester_id: PersonId(requester_id.into()),
            organization_id: OrganizationId(organization_id.into()),
            amount,
            category,
            description: String::new(),
            priority: RequestPriority::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }
}
