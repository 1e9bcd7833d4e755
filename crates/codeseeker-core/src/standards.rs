//! Coding standards mining: recurring conventions surfaced as ranked
//! candidates per concept, grouped into seven fixed categories.
//!
//! Mining works off a small declarative ruleset per category -- "a call to
//! `isEmail`", "an import of `zod`", `res.status(*).json({error})` -- rather
//! than a general pattern-learning pass. Each rule recognizes one concrete
//! way of expressing a concept; the miner counts how many distinct files use
//! each way and only surfaces a candidate once at least two files agree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CodeSeekerResult;
use crate::index::MetadataIndex;

/// The seven standards categories the profile always carries, even when a
/// category has no surfaced candidates yet.
pub const CATEGORIES: [&str; 7] =
    ["validation", "error_handling", "logging", "testing", "react_patterns", "state_management", "api_patterns"];

/// One recognized way of expressing a concept (e.g. "validate an email").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardCandidate {
    /// A representative source snippet.
    pub snippet: String,
    /// Number of distinct files using this exact expression of the concept.
    pub usage_count: usize,
    /// Monotonic function of `usage_count` and file spread, in `[0, 1]`.
    pub confidence: f64,
    /// Files where this expression was observed.
    pub files: Vec<String>,
}

/// Ranked candidates for a single concept within a category (e.g.
/// `validation.email -> [zod variant, regex variant]`, ranked by usage).
pub type ConceptCandidates = BTreeMap<String, Vec<StandardCandidate>>;

/// Per-project structured document of recurring conventions, one entry per
/// fixed category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardsProfile {
    /// Category name -> concept -> ranked candidates.
    pub categories: BTreeMap<String, ConceptCandidates>,
}

impl StandardsProfile {
    /// An empty profile with all seven categories present but empty. This is
    /// what readers get when no `standards.json` exists yet.
    #[must_use]
    pub fn empty() -> Self {
        let mut categories = BTreeMap::new();
        for name in CATEGORIES {
            categories.insert(name.to_string(), ConceptCandidates::new());
        }
        Self { categories }
    }

    /// Load a previously written profile, or an empty one if it doesn't exist
    /// yet -- readers tolerate a missing file rather than erroring.
    pub fn load(path: &Path) -> CodeSeekerResult<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Atomically persist the profile: write to a sibling temp file, then
    /// rename over the target, so a crash mid-write never leaves a truncated
    /// `standards.json` behind.
    pub fn save(&self, path: &Path) -> CodeSeekerResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Replace the given categories' candidates with freshly mined ones,
    /// leaving every other category untouched. Used after a pass that only
    /// touched a subset of files: categories unaffected by those files keep
    /// their prior state rather than being recomputed from a partial view.
    pub fn merge_categories(&mut self, fresh: BTreeMap<String, ConceptCandidates>) {
        for (category, candidates) in fresh {
            self.categories.insert(category, candidates);
        }
    }
}

/// A single recognition signal: a regex over chunk content, tagged with the
/// category/concept it's evidence for and how to extract a representative
/// snippet from a match.
struct Rule {
    category: &'static str,
    concept: &'static str,
    pattern: Regex,
}

fn rules() -> Vec<Rule> {
    let rule = |category, concept, pattern: &str| Rule { category, concept, pattern: Regex::new(pattern).expect("valid rule regex") };
    vec![
        // validation.email
        rule("validation", "email", r"z\.string\(\)\.email\(\)"),
        rule("validation", "email", r"(?i)\bisEmail\s*\("),
        rule("validation", "email", r#"(?i)re\.match\(.*@.*,"#),
        rule("validation", "email", r"(?i)regex.*@.*\.(com|org|net)"),
        // error_handling
        rule("error_handling", "result_type", r"->\s*Result<"),
        rule("error_handling", "try_except", r"\btry\s*:\s*\n"),
        rule("error_handling", "unwrap", r"\.unwrap\(\)"),
        // logging
        rule("logging", "structured", r"\btracing::(info|warn|error|debug)!"),
        rule("logging", "console", r"\bconsole\.(log|warn|error)\("),
        rule("logging", "print", r"\bprintln!\("),
        // testing
        rule("testing", "assertion", r"\bassert(_eq|_ne)?!\("),
        rule("testing", "jest_expect", r"\bexpect\([^)]*\)\.to"),
        // react_patterns
        rule("react_patterns", "hooks", r"\buse(State|Effect|Memo|Callback)\("),
        rule("react_patterns", "function_component", r"function\s+\w+\([^)]*\)\s*\{\s*return\s*\("),
        // state_management
        rule("state_management", "redux_slice", r"createSlice\("),
        rule("state_management", "zustand_store", r"\bcreate\(\(set"),
        // api_patterns
        rule("api_patterns", "json_error_response", r#"res\.status\(\d+\)\.json\(\{\s*error"#),
        rule("api_patterns", "axum_handler", r"async fn \w+\([^)]*\)\s*->\s*impl IntoResponse"),
    ]
}

/// Mine every rule's recognition signal across the current chunk set.
///
/// `changed_files`, if non-empty, limits mining to categories that have any
/// rule matching content in one of those files -- an incremental pass
/// shouldn't pay to recompute categories nothing it touched could affect.
/// An empty slice means "mine everything" (a full pass).
pub fn mine(index: &MetadataIndex, changed_files: &[PathBuf]) -> CodeSeekerResult<BTreeMap<String, ConceptCandidates>> {
    let conn = index.connection();
    let mut stmt = conn.prepare("SELECT c.content, f.path FROM chunks c JOIN files f ON f.id = c.file_id")?;
    let chunk_rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let changed: Option<std::collections::HashSet<String>> =
        if changed_files.is_empty() { None } else { Some(changed_files.iter().map(|p| p.to_string_lossy().to_string()).collect()) };

    // concept_key = "category/concept/snippet" -> (usage_count files)
    let mut hits: BTreeMap<(&'static str, &'static str, String), Vec<String>> = BTreeMap::new();
    let mut touched_categories: std::collections::HashSet<&'static str> = std::collections::HashSet::new();

    for rule in rules() {
        for (content, path) in &chunk_rows {
            let Some(m) = rule.pattern.find(content) else { continue };
            let snippet = representative_line(content, m.start());
            let key = (rule.category, rule.concept, snippet);
            let entry = hits.entry(key).or_default();
            if !entry.contains(path) {
                entry.push(path.clone());
            }
            let path_is_touched = changed.as_ref().map_or(true, |set| set.contains(path));
            if path_is_touched {
                touched_categories.insert(rule.category);
            }
        }
    }

    let mut by_category: BTreeMap<String, ConceptCandidates> = BTreeMap::new();
    for category in CATEGORIES {
        if changed.is_some() && !touched_categories.contains(category) {
            continue;
        }
        by_category.insert(category.to_string(), ConceptCandidates::new());
    }

    for ((category, concept, snippet), files) in hits {
        let Some(concepts) = by_category.get_mut(category) else { continue };
        if files.len() < 2 {
            continue;
        }
        let candidate = StandardCandidate { snippet, usage_count: files.len(), confidence: confidence_for(files.len()), files };
        concepts.entry(concept.to_string()).or_default().push(candidate);
    }

    for concepts in by_category.values_mut() {
        for candidates in concepts.values_mut() {
            candidates.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then_with(|| b.files.len().cmp(&a.files.len())));
        }
    }

    Ok(by_category)
}

fn representative_line(content: &str, byte_offset: usize) -> String {
    let line_start = content[..byte_offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = content[byte_offset..].find('\n').map_or(content.len(), |i| byte_offset + i);
    content[line_start..line_end].trim().to_string()
}

/// `usage_count` dominates; file spread nudges it up to reward a convention
/// that's genuinely project-wide rather than repeated within one file.
fn confidence_for(usage_count: usize) -> f64 {
    (0.5 + 0.1 * usage_count as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkKind, FileInfo, Language, Visibility};
    use tempfile::tempdir;

    fn seed_file(index: &mut MetadataIndex, path: &str, content: &str) {
        let file = FileInfo { id: 0, path: PathBuf::from(path), language: Language::TypeScript, content_hash: "h".into(), size_bytes: content.len() as u64, mtime: 0 };
        let chunk = Chunk {
            id: 0,
            file_id: 0,
            symbol_path: "m".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 1,
            content: content.into(),
            doc_comment: None,
            token_count: 1,
            weight: 0.5,
            vector_id: None,
            is_overlap: false,
        };
        index.reindex_file(&file, &[chunk], &[]).unwrap();
    }

    #[test]
    fn mining_threshold_requires_at_least_two_files() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("i.db")).unwrap();
        seed_file(&mut index, "a.ts", "const schema = z.string().email();");
        seed_file(&mut index, "b.ts", "const schema = z.string().email();");
        seed_file(&mut index, "c.ts", "if (re.match(r'.+@.+', input)) { ok(); }");

        let mined = mine(&index, &[]).unwrap();
        let validation = &mined["validation"];
        let email = &validation["email"];
        assert_eq!(email.len(), 1, "regex variant seen in only one file must not surface");
        assert_eq!(email[0].usage_count, 2);
        assert!(email[0].snippet.contains("z.string().email()"));
    }

    #[test]
    fn incremental_mine_limits_to_categories_touched_by_changed_files() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("i.db")).unwrap();
        seed_file(&mut index, "a.rs", "fn f() -> Result<(), E> {}");
        seed_file(&mut index, "b.rs", "fn g() -> Result<(), E> {}");
        seed_file(&mut index, "c.ts", "console.log('x'); console.log('y');");

        let mined = mine(&index, &[PathBuf::from("a.rs")]).unwrap();
        assert!(mined.contains_key("error_handling"));
        assert!(!mined.contains_key("logging"), "logging wasn't touched by the changed file set");
    }

    #[test]
    fn profile_round_trips_through_atomic_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("standards.json");
        let mut profile = StandardsProfile::empty();
        profile.merge_categories(BTreeMap::from([(
            "logging".to_string(),
            ConceptCandidates::from([(
                "structured".to_string(),
                vec![StandardCandidate { snippet: "tracing::info!(...)".into(), usage_count: 3, confidence: 0.8, files: vec!["a.rs".into()] }],
            )]),
        )]));
        profile.save(&path).unwrap();

        let loaded = StandardsProfile::load(&path).unwrap();
        assert_eq!(loaded.categories["logging"]["structured"][0].usage_count, 3);
        assert!(loaded.categories.contains_key("validation"), "untouched categories are preserved");
    }

    #[test]
    fn missing_profile_loads_as_empty_with_all_categories_present() {
        let dir = tempdir().unwrap();
        let profile = StandardsProfile::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(profile.categories.len(), CATEGORIES.len());
        assert!(profile.categories["api_patterns"].is_empty());
    }
}
