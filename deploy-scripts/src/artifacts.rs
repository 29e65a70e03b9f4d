//! Resolution of compiled contract artifacts
//!
//! Artifacts are the JSON files emitted by Hardhat (`artifacts/contracts/<File>.sol/<Name>.json`)
//! or Foundry (`out/<File>.sol/<Name>.json`). Both carry the contract ABI and its creation
//! bytecode; they differ only in how the bytecode is nested.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    fs,
    path::{Path, PathBuf},
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::{hex, Bytes};
use serde::Deserialize;
use tracing::debug;

use crate::constants::{ARTIFACT_EXTENSION, UNLINKED_LIBRARY_MARKER};

/// A contract compiled ahead of time, ready to be deployed
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    /// The name the contract was resolved by
    pub name: String,
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

/// Errors that can occur while resolving an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// No artifact exists for the name
    NotFound(String),
    /// More than one artifact exists for the name
    Ambiguous(String, Vec<PathBuf>),
    /// The artifact could not be read
    Read(String),
    /// The artifact is not valid JSON, or is missing fields
    Parse(String),
    /// The artifact has no creation bytecode (an interface or abstract contract)
    EmptyBytecode(String),
    /// The bytecode references libraries that have not been linked
    UnlinkedLibraries(String),
}

impl Display for ArtifactError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::NotFound(s) => write!(f, "no artifact found for `{}`", s),
            ArtifactError::Ambiguous(s, paths) => {
                let paths = paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>();
                write!(
                    f,
                    "`{}` is ambiguous, qualify it as `<source>:{}` to pick one of: {}",
                    s,
                    s,
                    paths.join(", ")
                )
            }
            ArtifactError::Read(s) => write!(f, "error reading artifact: {}", s),
            ArtifactError::Parse(s) => write!(f, "error parsing artifact: {}", s),
            ArtifactError::EmptyBytecode(s) => {
                write!(f, "`{}` has no bytecode, is it abstract or an interface?", s)
            }
            ArtifactError::UnlinkedLibraries(s) => {
                write!(f, "`{}` has unlinked library references", s)
            }
        }
    }
}

impl std::error::Error for ArtifactError {}

/// A source of compiled contracts, keyed by contract name
pub trait ArtifactSource {
    /// Resolve the named contract to its ABI and creation bytecode
    fn resolve(&self, name: &str) -> Result<CompiledContract, ArtifactError>;
}

impl ArtifactSource for HashMap<String, CompiledContract> {
    fn resolve(&self, name: &str) -> Result<CompiledContract, ArtifactError> {
        self.get(name).cloned().ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }
}

/// A directory tree of compiled artifacts
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    /// The root of the tree
    root: PathBuf,
}

impl ArtifactDir {
    /// Create an artifact source rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file for the given contract name.
    ///
    /// A bare name must match exactly one artifact anywhere under the root. A qualified name,
    /// `<source>:<Contract>`, names the artifact at `<root>/<source>/<Contract>.json`, e.g.
    /// `contracts/vault/Vault.sol:Vault` under Hardhat's `artifacts` directory.
    fn find(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        if let Some((source, contract)) = name.split_once(':') {
            let path = self.root.join(source).join(format!("{contract}.{ARTIFACT_EXTENSION}"));
            if !path.is_file() {
                return Err(ArtifactError::NotFound(name.to_string()));
            }
            return Ok(path);
        }

        let file_name = format!("{name}.{ARTIFACT_EXTENSION}");
        let mut found = Vec::new();
        find_files(&self.root, &file_name, &mut found)?;
        found.sort();

        match found.len() {
            0 => Err(ArtifactError::NotFound(name.to_string())),
            1 => Ok(found.remove(0)),
            _ => Err(ArtifactError::Ambiguous(name.to_string(), found)),
        }
    }
}

impl ArtifactSource for ArtifactDir {
    fn resolve(&self, name: &str) -> Result<CompiledContract, ArtifactError> {
        let path = self.find(name)?;
        debug!("Resolved `{}` to {}", name, path.display());

        let contents = fs::read_to_string(&path)
            .map_err(|e| ArtifactError::Read(format!("{}: {}", path.display(), e)))?;
        parse_artifact(name, &contents)
    }
}

/// Recursively collect every file under `dir` named exactly `file_name`.
///
/// Symlinked directories are not followed.
fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    let read_err = |e: std::io::Error| ArtifactError::Read(format!("{}: {}", dir.display(), e));

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_type().map_err(read_err)?.is_dir() {
            find_files(&entry.path(), file_name, found)?;
        } else if entry.file_name().to_str() == Some(file_name) {
            found.push(entry.path());
        }
    }

    Ok(())
}

/// The subset of an artifact file the deploy scripts use
#[derive(Deserialize)]
struct RawArtifact {
    /// The contract ABI
    abi: JsonAbi,
    /// The creation bytecode
    bytecode: RawBytecode,
}

/// Hardhat stores the bytecode as a hex string, Foundry nests it in an object
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// Hardhat layout
    Hex(String),
    /// Foundry layout
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

impl RawBytecode {
    /// The hex-encoded bytecode
    fn hex(&self) -> &str {
        match self {
            RawBytecode::Hex(s) => s,
            RawBytecode::Object { object } => object,
        }
    }
}

/// Parse an artifact file's contents into a [`CompiledContract`]
pub fn parse_artifact(name: &str, contents: &str) -> Result<CompiledContract, ArtifactError> {
    let raw: RawArtifact =
        serde_json::from_str(contents).map_err(|e| ArtifactError::Parse(e.to_string()))?;

    let bytecode_hex = raw.bytecode.hex().trim();
    if bytecode_hex.contains(UNLINKED_LIBRARY_MARKER) {
        return Err(ArtifactError::UnlinkedLibraries(name.to_string()));
    }

    let bytecode = hex::decode(bytecode_hex).map_err(|e| ArtifactError::Parse(e.to_string()))?;
    if bytecode.is_empty() {
        return Err(ArtifactError::EmptyBytecode(name.to_string()));
    }

    Ok(CompiledContract {
        name: name.to_string(),
        abi: raw.abi,
        bytecode: bytecode.into(),
    })
}
