//! Run identifiers.
//!
//! A [`RunId`] names one logical run and ends up in local paths and object
//! keys, so the only ways to obtain one are the grammar-checked constructors
//! below.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::config::ensure_slash;

/// Object whose arrival starts a run: `<prefix><run_id>/right.csv`.
pub const TRIGGER_FILE: &str = "right.csv";
/// Object fetched alongside the trigger.
pub const COMPANION_FILE: &str = "left.csv";

/// Hex characters kept from the content digest.
const DERIVED_ID_LEN: usize = 16;

static RUN_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap());

#[derive(Debug, Error)]
pub enum RunIdError {
    #[error("invalid run id {0:?}: must match [A-Za-z0-9][A-Za-z0-9_-]{{0,63}}")]
    Invalid(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A validated run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub fn parse(value: impl Into<String>) -> Result<Self, RunIdError> {
        let value = value.into();
        if RUN_ID_PATTERN.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(RunIdError::Invalid(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = RunIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// Extracts the run id from `<prefix><run_id>/right.csv`.
///
/// Anything else, including extra segments, another file name or an id
/// outside the grammar, yields `None`.
pub fn parse_run_id(object_name: &str, trusted_prefix: &str) -> Option<RunId> {
    let prefix = ensure_slash(trusted_prefix);
    let rest = object_name.strip_prefix(prefix.as_str())?;

    let mut parts = rest.split('/');
    let (id, file) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || file != TRIGGER_FILE {
        return None;
    }

    RunId::parse(id).ok()
}

/// Content-addressed id: SHA-256 over `first` then `second`, first 16 hex chars.
pub async fn derive_run_id(first: &Path, second: &Path) -> Result<RunId, RunIdError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    for path in [first, second] {
        let io_err = |source| RunIdError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
        loop {
            let n = file.read(&mut buf).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    RunId::parse(&hex[..DERIVED_ID_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_run_id_table() {
        let cases = [
            ("in/demo/right.csv", "in/", Some("demo")),
            ("in/demo/right.csv", "in", Some("demo")),
            ("in/Run_2024-01/right.csv", "in/", Some("Run_2024-01")),
            ("demo/right.csv", "", Some("demo")),
            ("in/demo/left.csv", "in/", None),
            ("in/demo/sub/right.csv", "in/", None),
            ("in/../right.csv", "in/", None),
            ("in/./right.csv", "in/", None),
            ("in/-demo/right.csv", "in/", None),
            ("in/_demo/right.csv", "in/", None),
            ("in//right.csv", "in/", None),
            ("in/demo/right.csv/", "in/", None),
            ("other/demo/right.csv", "in/", None),
            ("in/demo", "in/", None),
            ("in/de mo/right.csv", "in/", None),
        ];

        for (object, prefix, want) in cases {
            let got = parse_run_id(object, prefix);
            assert_eq!(
                got.as_ref().map(RunId::as_str),
                want,
                "object={object:?} prefix={prefix:?}"
            );
        }
    }

    #[test]
    fn test_run_id_length_limit() {
        let max = "a".repeat(64);
        assert!(RunId::parse(max.clone()).is_ok());
        assert!(RunId::parse(format!("{max}a")).is_err());
        assert!(RunId::parse("").is_err());
    }

    #[test]
    fn test_run_id_serde_validates() {
        let id: RunId = serde_json::from_str("\"demo\"").unwrap();
        assert_eq!(id.as_str(), "demo");
        assert!(serde_json::from_str::<RunId>("\"../x\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"demo\"");
    }

    #[tokio::test]
    async fn test_derive_run_id_deterministic_and_ordered() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "id,amount\n1,10\n").unwrap();
        std::fs::write(&b, "id,amount\n1,12\n").unwrap();

        let ab = derive_run_id(&a, &b).await.unwrap();
        let again = derive_run_id(&a, &b).await.unwrap();
        let ba = derive_run_id(&b, &a).await.unwrap();

        assert_eq!(ab, again);
        assert_ne!(ab, ba);
        assert_eq!(ab.as_str().len(), 16);
        assert!(ab.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_derive_run_id_known_digest() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "ab").unwrap();
        std::fs::write(&b, "c").unwrap();

        // sha256("abc")
        let id = derive_run_id(&a, &b).await.unwrap();
        assert_eq!(id.as_str(), "ba7816bf8f01cfea");
    }

    #[tokio::test]
    async fn test_derive_run_id_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.csv");
        let err = derive_run_id(&missing, &missing).await.unwrap_err();
        assert!(matches!(err, RunIdError::Io { .. }));
    }
}
