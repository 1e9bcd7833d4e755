//! User-controlled index exclusion rules.
//!
//! Stored at `.codeseeker/exclusions.json` in the project root, separate from
//! `config.toml` so a user can hand-edit or version exclusions independently.
//! Written atomically (write-to-temp, then rename) so a crash mid-write never
//! leaves a truncated file behind, matching the standards profile's
//! persistence convention.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::CodeSeekerResult;

/// A single user-added exclusion: the glob pattern, why it was added, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    /// Glob pattern (gitignore-style) to exclude.
    pub pattern: String,
    /// Why this pattern was excluded, as given by the caller.
    pub reason: String,
    /// RFC 3339 UTC timestamp of when the rule was added.
    pub added_at: String,
}

/// User-maintained exclusion rules, on top of the scanner's gitignore
/// handling and default excludes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionRules {
    /// Rules in the order they were added.
    #[serde(default)]
    pub rules: Vec<ExclusionRule>,

    #[serde(skip)]
    compiled: Option<CompiledPatterns>,
}

#[derive(Debug, Clone)]
struct CompiledPatterns(GlobSet);

impl ExclusionRules {
    /// Load exclusion rules from `<project_root>/.codeseeker/exclusions.json`.
    /// Returns an empty rule set if the file doesn't exist.
    pub fn load(project_root: &Path) -> CodeSeekerResult<Self> {
        let path = Self::path_for(project_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut rules: Self = serde_json::from_str(&content)?;
        rules.compile();
        Ok(rules)
    }

    /// Persist these rules to `<project_root>/.codeseeker/exclusions.json`.
    pub fn save(&self, project_root: &Path) -> CodeSeekerResult<()> {
        let path = Self::path_for(project_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Add a pattern with its reason, recompiling the matcher. No-op if the
    /// pattern is already present (the existing rule's reason/timestamp are
    /// left untouched).
    pub fn add_pattern(&mut self, pattern: String, reason: String) {
        if !self.rules.iter().any(|r| r.pattern == pattern) {
            self.rules.push(ExclusionRule { pattern, reason, added_at: now_rfc3339() });
        }
        self.compile();
    }

    /// Remove a pattern, recompiling the matcher.
    pub fn remove_pattern(&mut self, pattern: &str) {
        self.rules.retain(|r| r.pattern != pattern);
        self.compile();
    }

    /// Returns true if `path` matches any exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        match &self.compiled {
            Some(compiled) => compiled.0.is_match(path),
            None => false,
        }
    }

    fn compile(&mut self) {
        let mut builder = GlobSetBuilder::new();
        for rule in &self.rules {
            if let Ok(glob) = Glob::new(&rule.pattern) {
                builder.add(glob);
            }
        }
        self.compiled = builder.build().ok().map(CompiledPatterns);
    }

    fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(".codeseeker").join("exclusions.json")
    }
}

/// Current UTC time as an RFC 3339 string, accurate to the second.
///
/// No `chrono`/`time` dependency is in the tree for this one call site, so
/// this does the civil-date conversion by hand (Howard Hinnant's
/// days-from-epoch algorithm) rather than pull one in.
fn now_rfc3339() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    format_unix_timestamp(secs)
}

fn format_unix_timestamp(secs: u64) -> String {
    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompiled_rules_exclude_nothing() {
        let rules = ExclusionRules::default();
        assert!(!rules.is_excluded(Path::new("src/main.rs")));
    }

    #[test]
    fn added_pattern_matches_immediately() {
        let mut rules = ExclusionRules::default();
        rules.add_pattern("**/*.generated.rs".into(), "build output".into());
        assert!(rules.is_excluded(Path::new("src/api.generated.rs")));
        assert!(!rules.is_excluded(Path::new("src/api.rs")));
    }

    #[test]
    fn adding_same_pattern_twice_keeps_first_reason() {
        let mut rules = ExclusionRules::default();
        rules.add_pattern("vendor/**".into(), "first".into());
        rules.add_pattern("vendor/**".into(), "second".into());
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(rules.rules[0].reason, "first");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut rules = ExclusionRules::default();
        rules.add_pattern("vendor/**".into(), "vendored dependency".into());
        rules.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".codeseeker").join("exclusions.json")).unwrap();
        assert!(raw.contains("\"rules\""));
        assert!(raw.contains("\"reason\""));
        assert!(raw.contains("\"added_at\""));

        let loaded = ExclusionRules::load(dir.path()).unwrap();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.rules[0].pattern, "vendor/**");
        assert_eq!(loaded.rules[0].reason, "vendored dependency");
        assert!(loaded.is_excluded(Path::new("vendor/thing.rs")));
    }

    #[test]
    fn load_without_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let rules = ExclusionRules::load(dir.path()).unwrap();
        assert!(rules.rules.is_empty());
    }

    #[test]
    fn timestamp_formats_as_rfc3339() {
        assert_eq!(format_unix_timestamp(1_704_168_245), "2024-01-02T04:04:05Z");
    }

    #[test]
    fn timestamp_at_epoch_is_1970() {
        assert_eq!(format_unix_timestamp(0), "1970-01-01T00:00:00Z");
    }
}
