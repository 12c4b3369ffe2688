//! Source verification of deployed contracts.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;
use serde::Serialize;

use crate::BuildInfo;

/// Everything a block explorer needs to match a deployment with its sources.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Logical name, for logs.
    pub name: String,
    pub address: Address,
    /// `sourceName:ContractName`.
    pub contract_name: String,
    pub constructor_args: Bytes,
    /// Compiler input, when the artifact references one.
    pub build_info: Option<BuildInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    Verified,
    AlreadyVerified,
}

/// A source verification service.
pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<VerificationStatus>> + Send;
}

/// Outcome of verifying a whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub verified: Vec<String>,
    /// Contract name and failure reason.
    pub failed: Vec<(String, String)>,
}

impl VerificationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
