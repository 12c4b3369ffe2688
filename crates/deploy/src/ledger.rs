//! The deployment ledger and its rolling JSON snapshots.
//!
//! Snapshots live in `<ledger_dir>/<task>/` and are named
//! `<YYYYMMDD>T<HHMM>-<network>-deployment.json`. Every write removes the snapshot written
//! exactly one minute earlier, so a session normally leaves its latest snapshot behind.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GasEstimate;

/// Timestamp prefix of snapshot file names.
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M";
const SNAPSHOT_TIMESTAMP_LEN: usize = 13;
const SNAPSHOT_SUFFIX: &str = "deployment.json";

/// One confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Logical name, unique within a ledger.
    pub name: String,
    /// Artifact the bytecode came from.
    pub contract: String,
    pub address: Address,
    pub tx_hash: B256,
    /// Submissions needed, nonce collisions included.
    pub attempts: u32,
    /// ABI-encoded constructor arguments, empty when they could not be encoded.
    pub encoded_constructor_args: Bytes,
    pub constructor_arguments: Vec<Value>,
    pub verification_command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<GasEstimate>,
    #[serde(default)]
    pub upgradeable_proxy: bool,
}

/// The persisted form of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    pub deployed_contracts: Vec<DeploymentRecord>,
    pub total_deployment_cost: GasEstimate,
}

impl LedgerDocument {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ledger {}", path.display()))
    }
}

/// Append-only list of the deployments of one task on one network.
#[derive(Debug, Clone)]
pub struct DeploymentLedger {
    dir: PathBuf,
    network: String,
    records: Vec<DeploymentRecord>,
}

impl DeploymentLedger {
    pub fn new(root: impl AsRef<Path>, task: &str, network: &str) -> Self {
        Self {
            dir: root.as_ref().join(task),
            network: network.to_string(),
            records: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Records in deployment order.
    pub fn records(&self) -> &[DeploymentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// `base` if nothing is recorded under it yet, otherwise the first free `<base>_<n>`
    /// counting from 2.
    pub fn free_name(&self, base: &str) -> String {
        if self.find(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|name| self.find(name).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Summed gas limits priced at the highest gas price, over the records with an estimate.
    pub fn total_cost(&self) -> GasEstimate {
        GasEstimate::total(
            self.records
                .iter()
                .filter_map(|record| record.gas_estimate.as_ref()),
        )
    }

    pub fn to_document(&self) -> LedgerDocument {
        LedgerDocument {
            deployed_contracts: self.records.clone(),
            total_deployment_cost: self.total_cost(),
        }
    }

    /// Add a confirmed deployment and persist the ledger.
    ///
    /// Names are unique, a record whose name is already taken is rejected. If persisting
    /// fails the record is kept in memory and the error is returned.
    pub fn append(&mut self, record: DeploymentRecord) -> Result<PathBuf> {
        if let Some(existing) = self.find(&record.name) {
            anyhow::bail!(
                "{} is already recorded at {}, not recording {}",
                record.name,
                existing.address,
                record.address
            );
        }
        tracing::debug!(name = %record.name, address = %record.address, "Recording deployment");
        self.records.push(record);
        self.persist()
    }

    /// Write a snapshot for the current time.
    pub fn persist(&self) -> Result<PathBuf> {
        self.persist_at(Utc::now())
    }

    /// Write a snapshot as if it were `now`.
    pub fn persist_at(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create ledger directory {}", self.dir.display()))?;

        let path = self.dir.join(self.snapshot_name(now));
        let content = serde_json::to_string_pretty(&self.to_document())
            .context("Failed to serialize ledger")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write ledger to {}", path.display()))?;

        let stale = self.dir.join(self.snapshot_name(now - TimeDelta::minutes(1)));
        if stale.exists() {
            match std::fs::remove_file(&stale) {
                Ok(()) => tracing::debug!(path = %stale.display(), "Removed previous snapshot"),
                Err(e) => {
                    tracing::warn!(path = %stale.display(), error = %e, "Failed to remove previous snapshot")
                }
            }
        }

        tracing::info!(path = %path.display(), records = self.records.len(), "Ledger saved");
        Ok(path)
    }

    /// Append the records of a persisted snapshot, without re-persisting.
    ///
    /// Returns the number of records loaded.
    pub fn load_existing(&mut self, path: &Path) -> Result<usize> {
        let document = LedgerDocument::read(path)?;
        let count = document.deployed_contracts.len();
        self.records.extend(document.deployed_contracts);
        tracing::info!(path = %path.display(), records = count, "Loaded existing deployments");
        Ok(count)
    }

    /// Most recent snapshot of this ledger's network, if any.
    pub fn latest_snapshot(&self) -> Result<Option<PathBuf>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let mut latest: Option<(NaiveDateTime, PathBuf)> = None;
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(timestamp) = self.snapshot_timestamp(file_name) else {
                continue;
            };
            if latest.as_ref().is_none_or(|(best, _)| timestamp > *best) {
                latest = Some((timestamp, path));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }

    fn snapshot_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}",
            at.format(SNAPSHOT_TIMESTAMP_FORMAT),
            self.network,
            SNAPSHOT_SUFFIX
        )
    }

    /// Timestamp of `file_name` when it is a snapshot of this ledger's network.
    fn snapshot_timestamp(&self, file_name: &str) -> Option<NaiveDateTime> {
        let prefix = file_name.get(..SNAPSHOT_TIMESTAMP_LEN)?;
        let rest = file_name.get(SNAPSHOT_TIMESTAMP_LEN..)?;
        if rest != format!("-{}-{}", self.network, SNAPSHOT_SUFFIX) {
            return None;
        }
        NaiveDateTime::parse_from_str(prefix, SNAPSHOT_TIMESTAMP_FORMAT).ok()
    }
}
