//! Verification through an Etherscan-compatible explorer API.

use std::time::Duration;

use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use crate::{NetworkConfig, VerificationRequest, VerificationStatus, Verifier};

/// Default interval between two `checkverifystatus` polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status polls before giving up.
const DEFAULT_MAX_POLLS: usize = 24;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// What `verifysourcecode` answered.
#[derive(Debug, PartialEq, Eq)]
enum Submission {
    /// Accepted, with the GUID to poll.
    Queued(String),
    AlreadyVerified,
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("verification still pending")]
    Pending,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

fn is_already_verified(result: &str) -> bool {
    result.to_lowercase().contains("already verified")
}

fn parse_submission(response: ApiResponse) -> Result<Submission> {
    if is_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }
    if response.status != "1" {
        anyhow::bail!(
            "Verification request rejected: {} ({})",
            response.result,
            response.message
        );
    }
    Ok(Submission::Queued(response.result))
}

fn parse_status(response: ApiResponse) -> Result<VerificationStatus, CheckError> {
    let result = response.result.to_lowercase();
    if is_already_verified(&result) {
        return Ok(VerificationStatus::AlreadyVerified);
    }
    if result.contains("pending") || result.contains("in queue") {
        return Err(CheckError::Pending);
    }
    if response.status == "1" {
        return Ok(VerificationStatus::Verified);
    }
    Err(anyhow::anyhow!("Verification failed: {}", response.result).into())
}

/// Submits standard-JSON verification requests and waits for their outcome.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    poll_interval: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid explorer API URL: {}", api_url))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Verifier for the explorer of `network`.
    pub fn for_network(network: &NetworkConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_url = network
            .explorer_api_url
            .as_deref()
            .with_context(|| format!("Network {} has no explorer API configured", network.name))?;
        Self::new(api_url, api_key)
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let build_info = request.build_info.as_ref().with_context(|| {
            format!(
                "No build info for {}, compile with hardhat to keep the compiler input",
                request.contract_name
            )
        })?;
        let source_code = serde_json::to_string(&build_info.input)
            .context("Failed to serialize compiler input")?;
        let compiler_version = format!("v{}", build_info.solc_long_version);
        let address = request.address.to_checksum(None);
        let constructor_args = hex::encode(&request.constructor_args);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", compiler_version.as_str()),
            // sic, the explorer API expects this spelling
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response: ApiResponse = self
            .client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .context("Failed to send verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        parse_submission(response)
    }

    async fn check(&self, guid: &str) -> Result<VerificationStatus, CheckError> {
        let response: ApiResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send verification status request")?
            .json()
            .await
            .context("Failed to parse verification status response")?;

        parse_status(response)
    }
}

impl Verifier for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        let guid = match self.submit(request).await? {
            Submission::AlreadyVerified => return Ok(VerificationStatus::AlreadyVerified),
            Submission::Queued(guid) => guid,
        };
        tracing::debug!(name = %request.name, guid = %guid, "Verification queued");

        let check = || self.check(&guid);
        let status = check
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls),
            )
            .sleep(tokio::time::sleep)
            .when(|e: &CheckError| matches!(e, CheckError::Pending))
            .notify(|_: &CheckError, _: Duration| {
                tracing::trace!(name = %request.name, "Verification pending, polling again...");
            })
            .await;

        match status {
            Ok(status) => Ok(status),
            Err(CheckError::Pending) => {
                anyhow::bail!("Timeout waiting for verification of {}", request.name)
            }
            Err(CheckError::Failed(e)) => Err(e),
        }
    }
}
