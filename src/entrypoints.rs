//! C1: Entry-Point Scanner.
//!
//! Validates that a path is a buildable Go module and enumerates candidate
//! program entry points. Parsing is syntactic only (regexes over source
//! text), the same spirit as C3's parser — no type checking here either.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CoreError, CoreResult, ModuleInvalidReason};

/// Result of [`validate_module`].
#[derive(Debug, Clone)]
pub struct ModuleValidation {
    pub module_path: String,
    pub module_root_dir: PathBuf,
}

/// Search upward from `path` (and, failing that, into subdirectories up to
/// one level for the common monorepo `backend/go.mod` layout) for `go.mod`.
pub fn validate_module(path: &Path) -> CoreResult<ModuleValidation> {
    let start = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };

    if let Some(found) = search_upward(start) {
        return read_manifest(&found);
    }

    // Monorepo case: module lives in a subdirectory of the requested path.
    if let Some(found) = search_downward_one_level(start) {
        return read_manifest(&found);
    }

    Err(CoreError::ModuleInvalid {
        path: path.display().to_string(),
        reason: ModuleInvalidReason::NoManifest,
    })
}

fn search_upward(start: &Path) -> Option<PathBuf> {
    let mut cur = Some(start);
    while let Some(dir) = cur {
        let candidate = dir.join("go.mod");
        if candidate.is_file() {
            return Some(dir.to_path_buf());
        }
        cur = dir.parent();
    }
    None
}

fn search_downward_one_level(start: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(start).ok()?;
    for entry in entries.flatten() {
        let p = entry.path();
        if p.is_dir() && p.join("go.mod").is_file() {
            return Some(p);
        }
    }
    None
}

fn read_manifest(module_root_dir: &Path) -> CoreResult<ModuleValidation> {
    let manifest_path = module_root_dir.join("go.mod");
    let contents = std::fs::read_to_string(&manifest_path).map_err(|_| CoreError::ModuleInvalid {
        path: manifest_path.display().to_string(),
        reason: ModuleInvalidReason::UnreadableManifest,
    })?;

    let module_path = contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("module "))
        .map(|s| s.trim().to_string())
        .ok_or_else(|| CoreError::ModuleInvalid {
            path: manifest_path.display().to_string(),
            reason: ModuleInvalidReason::MalformedManifest,
        })?;

    Ok(ModuleValidation {
        module_path,
        module_root_dir: module_root_dir.to_path_buf(),
    })
}

/// Entry-point candidate type, per §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Cmd,
    Root,
    AllExported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub file: String,
    pub function: String,
    #[serde(rename = "type")]
    pub candidate_type: CandidateType,
    /// Lower = more preferred.
    pub priority: u32,
    pub recommended: bool,
}

static MAIN_FUNC_RE_SRC: &str = r"(?m)^func\s+main\s*\(\s*\)";
static PACKAGE_MAIN_RE_SRC: &str = r"(?m)^package\s+main\b";

/// Scan `module_root` for entry-point candidates: files under `cmd/**`
/// declaring `package main` + `func main()` (type `cmd`), a `package main`
/// file at the module root (type `root`), plus the always-available
/// sentinel `*` (type `all_exported`).
pub fn scan_entry_points(module_root: &Path) -> CoreResult<Vec<Candidate>> {
    let package_main_re = Regex::new(PACKAGE_MAIN_RE_SRC).unwrap();
    let main_func_re = Regex::new(MAIN_FUNC_RE_SRC).unwrap();

    let mut cmd_candidates: Vec<(String, String)> = Vec::new(); // (cmd name, relative file)
    let mut root_candidate: Option<String> = None;

    let walker = ignore::WalkBuilder::new(module_root)
        .hidden(false)
        .git_ignore(true)
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        if !package_main_re.is_match(&contents) || !main_func_re.is_match(&contents) {
            continue;
        }
        let relative = path
            .strip_prefix(module_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if let Some(cmd_name) = cmd_name_from_path(&relative) {
            cmd_candidates.push((cmd_name, relative));
        } else if !relative.contains('/') {
            root_candidate = Some(relative);
        }
    }

    cmd_candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    for (priority, (_, relative)) in cmd_candidates.iter().enumerate() {
        out.push(Candidate {
            file: relative.clone(),
            function: "main".to_string(),
            candidate_type: CandidateType::Cmd,
            priority: priority as u32,
            recommended: priority == 0 && root_candidate.is_none(),
        });
    }

    if let Some(relative) = root_candidate {
        out.push(Candidate {
            file: relative,
            function: "main".to_string(),
            candidate_type: CandidateType::Root,
            priority: out.len() as u32,
            recommended: cmd_candidates.is_empty(),
        });
    }

    out.push(Candidate {
        file: String::new(),
        function: "*".to_string(),
        candidate_type: CandidateType::AllExported,
        priority: out.len() as u32,
        recommended: false,
    });

    debug!(count = out.len(), "scanned entry point candidates");
    Ok(out)
}

fn cmd_name_from_path(relative: &str) -> Option<String> {
    let mut parts = relative.split('/');
    if parts.next()? != "cmd" {
        return None;
    }
    let name = parts.next()?.to_string();
    Some(name)
}

/// Known Git hosting hosts rewritten to HTTPS form for project identity.
const KNOWN_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Normalize a Git remote URL into a stable project identity: lowercase,
/// strip a trailing `.git`, rewrite `git@host:owner/repo` and
/// `ssh://git@host/owner/repo` to `https://host/owner/repo` for known hosts.
pub fn normalize_remote_url(raw: &str) -> String {
    let mut s = raw.trim().to_ascii_lowercase();

    if let Some(rest) = s.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            if KNOWN_HOSTS.contains(&host) {
                s = format!("https://{host}/{path}");
            }
        }
    } else if let Some(rest) = s.strip_prefix("ssh://git@") {
        if let Some((host, path)) = rest.split_once('/') {
            if KNOWN_HOSTS.contains(&host) {
                s = format!("https://{host}/{path}");
            }
        }
    }

    s.strip_suffix(".git").map(|s| s.to_string()).unwrap_or(s)
}

/// Extract and normalize the `origin` remote URL of the repo containing
/// `path`. Shells out to `git config --get remote.origin.url`, matching
/// C2's preference for the git CLI over an embedded git library.
pub async fn get_remote_url(path: &Path) -> CoreResult<Option<String>> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(path)
        .args(["config", "--get", "remote.origin.url"])
        .output()
        .await?;

    if !output.status.success() {
        return Ok(None);
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(normalize_remote_url(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn validates_module_at_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/foo\n\ngo 1.22\n").unwrap();
        let v = validate_module(dir.path()).unwrap();
        assert_eq!(v.module_path, "example.com/foo");
    }

    #[test]
    fn validates_module_in_monorepo_subdir() {
        let dir = tempdir().unwrap();
        let backend = dir.path().join("backend");
        std::fs::create_dir(&backend).unwrap();
        std::fs::write(backend.join("go.mod"), "module example.com/backend\n").unwrap();
        let v = validate_module(dir.path()).unwrap();
        assert_eq!(v.module_root_dir, backend);
    }

    #[test]
    fn missing_manifest_is_no_manifest() {
        let dir = tempdir().unwrap();
        let err = validate_module(dir.path()).unwrap_err();
        match err {
            CoreError::ModuleInvalid { reason, .. } => {
                assert_eq!(reason, ModuleInvalidReason::NoManifest)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn scans_cmd_and_root_candidates() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/foo\n").unwrap();
        let cmd_dir = dir.path().join("cmd/server");
        std::fs::create_dir_all(&cmd_dir).unwrap();
        std::fs::write(cmd_dir.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();

        let candidates = scan_entry_points(dir.path()).unwrap();
        let cmd = candidates
            .iter()
            .find(|c| c.candidate_type == CandidateType::Cmd)
            .unwrap();
        assert_eq!(cmd.file, "cmd/server/main.go");
        assert!(cmd.recommended);

        let sentinel = candidates
            .iter()
            .find(|c| c.candidate_type == CandidateType::AllExported)
            .unwrap();
        assert_eq!(sentinel.function, "*");
    }

    #[test]
    fn normalizes_ssh_and_git_at_forms() {
        assert_eq!(
            normalize_remote_url("git@github.com:Acme/Repo.git"),
            "https://github.com/acme/repo"
        );
        assert_eq!(
            normalize_remote_url("ssh://git@gitlab.com/acme/repo.git"),
            "https://gitlab.com/acme/repo"
        );
        assert_eq!(
            normalize_remote_url("https://GitHub.com/acme/repo.git"),
            "https://github.com/acme/repo"
        );
    }
}
