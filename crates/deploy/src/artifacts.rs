//! Compiled contract artifacts.
//!
//! Artifacts are looked up by contract name anywhere below the artifacts directory. Both the
//! hardhat layout (`artifacts/contracts/Foo.sol/Foo.json`, `bytecode` as a hex string) and the
//! foundry layout (`out/Foo.sol/Foo.json`, `bytecode.object`) are understood.

use std::path::{Path, PathBuf};

use alloy_core::{
    json_abi::JsonAbi,
    primitives::{Address, Bytes},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Directory holding hardhat build-info files, skipped when searching artifacts.
const BUILD_INFO_DIR: &str = "build-info";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(Bytes),
    Object { object: Bytes },
}

impl From<BytecodeField> for Bytes {
    fn from(field: BytecodeField) -> Self {
        match field {
            BytecodeField::Hex(bytes) | BytecodeField::Object { object: bytes } => bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    #[serde(default)]
    contract_name: Option<String>,
    #[serde(default)]
    source_name: Option<String>,
    abi: JsonAbi,
    bytecode: BytecodeField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Compiler input needed to verify a contract's sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// e.g. `0.8.19+commit.7dd6d404`.
    pub solc_long_version: String,
    /// The solc standard-JSON input.
    pub input: Value,
}

/// A deployable contract: its interface and creation bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub name: String,
    /// Source file the contract was compiled from, e.g. `contracts/PriceGetter.sol`.
    pub source_name: Option<String>,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    /// Hardhat build-info file, when the artifact has a `.dbg.json` companion.
    pub build_info_path: Option<PathBuf>,
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self {
            name: name.into(),
            source_name: None,
            abi,
            bytecode,
            build_info_path: None,
        }
    }

    /// Parse an artifact file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let name = match file.contract_name {
            Some(name) => name,
            None => path
                .file_stem()
                .context("Artifact path has no file name")?
                .to_string_lossy()
                .to_string(),
        };

        Ok(Self {
            name,
            source_name: file.source_name,
            abi: file.abi,
            bytecode: file.bytecode.into(),
            build_info_path: resolve_build_info(path),
        })
    }

    /// `sourceName:ContractName`, as expected by block explorers.
    pub fn fully_qualified_name(&self) -> String {
        match &self.source_name {
            Some(source) => format!("{}:{}", source, self.name),
            None => self.name.clone(),
        }
    }

    /// Load the compiler input this artifact was built with, if it is known.
    pub fn build_info(&self) -> Result<Option<BuildInfo>> {
        let Some(path) = &self.build_info_path else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read build info {}", path.display()))?;
        let info = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build info {}", path.display()))?;
        Ok(Some(info))
    }

    /// Handle on this contract's interface at `address`.
    pub fn at(&self, name: impl Into<String>, address: Address) -> ContractHandle {
        ContractHandle {
            name: name.into(),
            address,
            abi: self.abi.clone(),
        }
    }
}

/// A deployed contract: the interface to talk to it through, and where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractHandle {
    pub name: String,
    pub address: Address,
    pub abi: JsonAbi,
}

/// Follow `Foo.dbg.json` next to `Foo.json` to the build-info file it references.
fn resolve_build_info(artifact_path: &Path) -> Option<PathBuf> {
    let dbg_path = artifact_path.with_extension("dbg.json");
    let content = std::fs::read_to_string(&dbg_path).ok()?;
    let debug: DebugFile = serde_json::from_str(&content)
        .inspect_err(|err| {
            tracing::debug!(path = %dbg_path.display(), %err, "Ignoring unreadable debug file");
        })
        .ok()?;

    let path = dbg_path.parent()?.join(debug.build_info);
    path.exists().then_some(path)
}

/// Finds artifacts by contract name below a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the artifact of `contract`.
    ///
    /// When several files match, the lexicographically first path wins so lookups are stable.
    pub fn load(&self, contract: &str) -> Result<ContractArtifact> {
        let file_name = format!("{contract}.json");
        let mut matches = Vec::new();
        collect_matches(&self.root, &file_name, &mut matches).with_context(|| {
            format!("Failed to search artifacts in {}", self.root.display())
        })?;
        matches.sort();

        let path = matches.first().with_context(|| {
            format!(
                "No artifact named {} found below {}",
                file_name,
                self.root.display()
            )
        })?;

        tracing::debug!(contract, path = %path.display(), "Loading artifact");
        ContractArtifact::from_file(path)
    }
}

fn collect_matches(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == BUILD_INFO_DIR) {
                continue;
            }
            collect_matches(&path, file_name, matches)?;
        } else if path.file_name().is_some_and(|name| name == file_name) {
            matches.push(path);
        }
    }
    Ok(())
}
