use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// On-disk shape of `rosters.json` in the workspace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub rosters: Vec<String>,
}

/// The set of roster tables this workspace is allowed to touch.
///
/// Loaded once at `workspace.select`. Adding a teacher is a config edit,
/// not a code change; nothing else in the crate may name a table.
#[derive(Debug, Clone)]
pub struct RosterRegistry {
    names: Vec<String>,
}

/// A roster identifier that has passed registry validation.
///
/// This is the only string ever interpolated into SQL text, so the only
/// way to construct one is through [`RosterRegistry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterId(String);

impl RosterId {
    pub fn table(&self) -> &str {
        &self.0
    }
}

const CONFIG_FILE: &str = "rosters.json";

impl RosterRegistry {
    /// Load the registry from `rosters.json` in the workspace. A missing
    /// file is seeded as an empty registry so a fresh workspace opens
    /// cleanly; a malformed file or an invalid identifier is an error.
    pub fn load(workspace: &Path) -> anyhow::Result<RosterRegistry> {
        let path = workspace.join(CONFIG_FILE);
        if !path.exists() {
            let empty = RosterConfig { rosters: vec![] };
            std::fs::write(&path, serde_json::to_string_pretty(&empty)?)?;
            log::info!("seeded empty roster registry at {}", path.display());
            return Ok(RosterRegistry { names: vec![] });
        }

        let text = std::fs::read_to_string(&path)?;
        let config: RosterConfig = serde_json::from_str(&text)?;
        for name in &config.rosters {
            if !is_valid_identifier(name) {
                anyhow::bail!("invalid roster identifier in {}: '{}'", CONFIG_FILE, name);
            }
        }
        Ok(RosterRegistry {
            names: config.rosters,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn ids(&self) -> Vec<RosterId> {
        self.names.iter().map(|n| RosterId(n.clone())).collect()
    }

    /// Resolve a caller-supplied roster name into a typed handle. Rejected
    /// names never reach a query builder.
    pub fn resolve(&self, name: &str) -> Result<RosterId, StoreError> {
        if self.names.iter().any(|n| n == name) {
            Ok(RosterId(name.to_string()))
        } else {
            log::warn!("rejected roster name: '{}'", name);
            Err(StoreError::Authorization(format!(
                "roster '{}' is not registered",
                name
            )))
        }
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> RosterRegistry {
        RosterRegistry {
            names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn resolve_accepts_registered_names_only() {
        let reg = registry(&["students_teacher1", "students_teacher2"]);
        assert!(reg.resolve("students_teacher1").is_ok());
        assert!(reg.resolve("students_teacher3").is_err());
        assert!(reg.resolve("students_teacher1; DROP TABLE x").is_err());
        assert!(reg.resolve("").is_err());
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("students_teacher1"));
        assert!(is_valid_identifier("_t"));
        assert!(!is_valid_identifier("1students"));
        assert!(!is_valid_identifier("bad-name"));
        assert!(!is_valid_identifier("bad name"));
        assert!(!is_valid_identifier(""));
    }
}
