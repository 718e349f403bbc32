// SPDX-License-Identifier: MIT
//! Governance proposal content understood by the bridge.
//!
//! Content is a closed enum. Which kinds a chain accepts, and how each is
//! validated, is decided by a [`ProposalTypeRegistry`] built at startup.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BridgeParams;

pub const MAX_TITLE_LENGTH: usize = 140;
pub const MAX_DESCRIPTION_LENGTH: usize = 5000;

pub const PROPOSAL_TYPE_TEXT: &str = "Text";
pub const PROPOSAL_TYPE_SOFTWARE_UPGRADE: &str = "SoftwareUpgrade";
pub const PROPOSAL_TYPE_BRIDGE_PARAMS: &str = "VMBridgeParams";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("proposal title cannot be blank")]
    BlankTitle,
    #[error("proposal title is longer than 140 characters")]
    TitleTooLong,
    #[error("proposal description cannot be blank")]
    BlankDescription,
    #[error("proposal description is longer than 5000 characters")]
    DescriptionTooLong,
    #[error("unrecognized proposal type: {0}")]
    UnknownType(String),
    #[error("already registered proposal type: {0}")]
    DuplicateType(String),
    #[error("'{0}' is not a valid proposal status")]
    InvalidStatus(String),
    #[error("invalid proposal: {0}")]
    Invalid(String),
}

/// Tagged on the wire with [`ProposalContent::proposal_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProposalContent {
    Text {
        title: String,
        description: String,
    },
    SoftwareUpgrade {
        title: String,
        description: String,
        name: String,
        height: u64,
    },
    #[serde(rename = "VMBridgeParams")]
    BridgeParams {
        title: String,
        description: String,
        params: BridgeParams,
    },
}

impl ProposalContent {
    pub fn title(&self) -> &str {
        match self {
            ProposalContent::Text { title, .. }
            | ProposalContent::SoftwareUpgrade { title, .. }
            | ProposalContent::BridgeParams { title, .. } => title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ProposalContent::Text { description, .. }
            | ProposalContent::SoftwareUpgrade { description, .. }
            | ProposalContent::BridgeParams { description, .. } => description,
        }
    }

    pub fn proposal_type(&self) -> &'static str {
        match self {
            ProposalContent::Text { .. } => PROPOSAL_TYPE_TEXT,
            ProposalContent::SoftwareUpgrade { .. } => PROPOSAL_TYPE_SOFTWARE_UPGRADE,
            ProposalContent::BridgeParams { .. } => PROPOSAL_TYPE_BRIDGE_PARAMS,
        }
    }
}

/// Title and description checks shared by every proposal kind.
pub fn validate_abstract(content: &ProposalContent) -> Result<(), ProposalError> {
    let title = content.title();
    if title.trim().is_empty() {
        return Err(ProposalError::BlankTitle);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ProposalError::TitleTooLong);
    }
    let description = content.description();
    if description.trim().is_empty() {
        return Err(ProposalError::BlankDescription);
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ProposalError::DescriptionTooLong);
    }
    Ok(())
}

fn validate_software_upgrade(content: &ProposalContent) -> Result<(), ProposalError> {
    validate_abstract(content)?;
    if let ProposalContent::SoftwareUpgrade { name, height, .. } = content {
        if name.trim().is_empty() {
            return Err(ProposalError::Invalid("upgrade name cannot be blank".into()));
        }
        if *height == 0 {
            return Err(ProposalError::Invalid("upgrade height must be positive".into()));
        }
    }
    Ok(())
}

pub type ProposalValidator = fn(&ProposalContent) -> Result<(), ProposalError>;

/// Proposal type tag → validation capability.
#[derive(Debug, Clone)]
pub struct ProposalTypeRegistry {
    validators: BTreeMap<String, ProposalValidator>,
}

impl ProposalTypeRegistry {
    pub fn empty() -> Self {
        ProposalTypeRegistry {
            validators: BTreeMap::new(),
        }
    }

    /// Registry with the `Text` and `SoftwareUpgrade` kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.validators.insert(PROPOSAL_TYPE_TEXT.into(), validate_abstract);
        registry
            .validators
            .insert(PROPOSAL_TYPE_SOFTWARE_UPGRADE.into(), validate_software_upgrade);
        registry
    }

    pub fn register(
        &mut self,
        proposal_type: &str,
        validator: ProposalValidator,
    ) -> Result<(), ProposalError> {
        if self.validators.contains_key(proposal_type) {
            return Err(ProposalError::DuplicateType(proposal_type.to_string()));
        }
        self.validators.insert(proposal_type.to_string(), validator);
        Ok(())
    }

    pub fn is_valid_type(&self, proposal_type: &str) -> bool {
        self.validators.contains_key(proposal_type)
    }

    pub fn validate(&self, content: &ProposalContent) -> Result<(), ProposalError> {
        let validator = self
            .validators
            .get(content.proposal_type())
            .ok_or_else(|| ProposalError::UnknownType(content.proposal_type().to_string()))?;
        validator(content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProposalStatus {
    #[default]
    Nil,
    DepositPeriod,
    VotingPeriod,
    Passed,
    Rejected,
    Failed,
}

impl FromStr for ProposalStatus {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DepositPeriod" => Ok(ProposalStatus::DepositPeriod),
            "VotingPeriod" => Ok(ProposalStatus::VotingPeriod),
            "Passed" => Ok(ProposalStatus::Passed),
            "Rejected" => Ok(ProposalStatus::Rejected),
            "Failed" => Ok(ProposalStatus::Failed),
            "" => Ok(ProposalStatus::Nil),
            other => Err(ProposalError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalStatus::Nil => "",
            ProposalStatus::DepositPeriod => "DepositPeriod",
            ProposalStatus::VotingPeriod => "VotingPeriod",
            ProposalStatus::Passed => "Passed",
            ProposalStatus::Rejected => "Rejected",
            ProposalStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

impl TryFrom<String> for ProposalStatus {
    type Error = ProposalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProposalStatus> for String {
    fn from(value: ProposalStatus) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub status: ProposalStatus,
    pub content: ProposalContent,
}
