//! Containment checks for every path derived from user or AI input.
//!
//! A candidate is a relative path string. It is accepted only when, after
//! joining it onto the base and resolving symbolic links, the result is the
//! base itself or lies beneath it. Containment is decided per path component,
//! so `/proj/specs-evil` is never inside `/proj/specs`.
//!
//! Nothing here touches the filesystem beyond reading metadata and links.

use crate::error::{PathSecurityError, PathViolation, Result, SpecflowError};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Symlink hops followed while resolving a dangling tail before giving up.
const MAX_LINK_HOPS: usize = 40;

// ---------------------------------------------------------------------------
// PathGuard
// ---------------------------------------------------------------------------

/// A base directory, canonicalized once, that candidates are resolved against.
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
}

impl PathGuard {
    /// Canonicalize `base`. The base does not have to exist yet; its missing
    /// tail is appended to the deepest existing (resolved) ancestor.
    pub fn new(base: &Path) -> Result<Self> {
        let absolute = std::path::absolute(base)?;
        match soft_canonicalize(&absolute) {
            Ok(base) => Ok(Self { base }),
            Err(Unresolved::LinkLoop) => {
                Err(PathSecurityError::new(PathViolation::SymlinkEscape, base, "").into())
            }
            Err(Unresolved::Io(e)) => Err(e.into()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `candidate` beneath the base. Containment failures are
    /// [`SpecflowError::PathSecurity`]; anything else the filesystem reports
    /// while resolving is [`SpecflowError::Io`].
    pub fn resolve(&self, candidate: &str) -> Result<PathBuf> {
        self.resolve_inner(candidate).inspect_err(|e| match e {
            SpecflowError::PathSecurity(e) => tracing::warn!(
                reason = e.violation.code(),
                base = %self.base.display(),
                candidate = %e.candidate,
                "path rejected"
            ),
            other => tracing::debug!(
                base = %self.base.display(),
                error = %other,
                "path could not be resolved"
            ),
        })
    }

    fn resolve_inner(&self, candidate: &str) -> Result<PathBuf> {
        let reject = |violation| -> SpecflowError {
            PathSecurityError::new(violation, &self.base, candidate).into()
        };

        if candidate.contains('\0') {
            return Err(reject(PathViolation::NullByte));
        }
        if is_absolute_candidate(candidate) {
            return Err(reject(PathViolation::AbsolutePath));
        }

        let mut joined = self.base.clone();
        for segment in candidate.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => return Err(reject(PathViolation::Traversal)),
                name => joined.push(name),
            }
        }

        let resolved = match soft_canonicalize(&joined) {
            Ok(resolved) => resolved,
            // Loops fail closed.
            Err(Unresolved::LinkLoop) => return Err(reject(PathViolation::SymlinkEscape)),
            Err(Unresolved::Io(e)) => return Err(e.into()),
        };
        if !resolved.starts_with(&self.base) {
            return Err(reject(PathViolation::SymlinkEscape));
        }
        Ok(resolved)
    }
}

/// One-shot form of [`PathGuard::resolve`].
pub fn validate(base: &Path, candidate: &str) -> Result<PathBuf> {
    PathGuard::new(base)?.resolve(candidate)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Why [`soft_canonicalize`] gave up.
#[derive(Debug)]
enum Unresolved {
    /// More than [`MAX_LINK_HOPS`] links, or the OS reported a loop.
    LinkLoop,
    Io(io::Error),
}

impl From<io::Error> for Unresolved {
    fn from(e: io::Error) -> Self {
        if is_link_loop(&e) {
            Unresolved::LinkLoop
        } else {
            Unresolved::Io(e)
        }
    }
}

#[cfg(unix)]
fn is_link_loop(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_link_loop(_: &io::Error) -> bool {
    false
}

/// Absolute on any platform: leading separator, UNC prefix or drive letter.
fn is_absolute_candidate(candidate: &str) -> bool {
    if candidate.starts_with('/') || candidate.starts_with('\\') {
        return true;
    }
    let bytes = candidate.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// `fs::canonicalize` that tolerates a missing tail.
///
/// Walks up to the deepest existing ancestor, canonicalizes it, and appends
/// the missing components. A dangling symlink on the way is followed to its
/// target so a later write cannot land outside through it.
fn soft_canonicalize(path: &Path) -> std::result::Result<PathBuf, Unresolved> {
    let mut current = path.to_path_buf();
    let mut hops = 0;

    'outer: loop {
        let mut existing = current.as_path();
        let mut tail: Vec<OsString> = Vec::new();
        loop {
            match fs::canonicalize(existing) {
                Ok(mut resolved) => {
                    for name in tail.iter().rev() {
                        resolved.push(name);
                    }
                    return Ok(resolved);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let is_link = fs::symlink_metadata(existing)
                        .map(|m| m.file_type().is_symlink())
                        .unwrap_or(false);
                    if is_link {
                        hops += 1;
                        if hops > MAX_LINK_HOPS {
                            return Err(Unresolved::LinkLoop);
                        }
                        let target = fs::read_link(existing)?;
                        let mut next = match existing.parent() {
                            Some(parent) => parent.join(target),
                            None => target,
                        };
                        for name in tail.iter().rev() {
                            next.push(name);
                        }
                        current = next;
                        continue 'outer;
                    }
                    match (existing.parent(), existing.file_name()) {
                        (Some(parent), Some(name)) => {
                            tail.push(name.to_os_string());
                            existing = parent;
                        }
                        _ => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn violation(base: &Path, candidate: &str) -> PathViolation {
        match validate(base, candidate) {
            Err(SpecflowError::PathSecurity(e)) => e.violation,
            other => panic!("expected rejection of {candidate:?}, got {other:?}"),
        }
    }

    #[test]
    fn rejects_parent_segments_for_any_base() {
        let dir = TempDir::new().unwrap();
        let bases = [dir.path().to_path_buf(), dir.path().join("specs"), PathBuf::from("/")];
        for base in &bases {
            for candidate in ["..", "../x", "a/../../b", "a/..", "a\\..\\b", "./../etc"] {
                assert_eq!(violation(base, candidate), PathViolation::Traversal);
            }
        }
    }

    #[test]
    fn rejects_absolute_candidates() {
        let dir = TempDir::new().unwrap();
        for candidate in ["/etc/passwd", "\\windows", "C:\\Windows", "c:relative", "\\\\server\\share"] {
            assert_eq!(violation(dir.path(), candidate), PathViolation::AbsolutePath);
        }
    }

    #[test]
    fn rejects_nul_bytes_before_anything_else() {
        let dir = TempDir::new().unwrap();
        assert_eq!(violation(dir.path(), "ok\0/../x"), PathViolation::NullByte);
        assert_eq!(violation(dir.path(), "/abs\0"), PathViolation::NullByte);
    }

    #[test]
    fn accepts_nested_paths_that_do_not_exist_yet() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("specs");
        let resolved = validate(&base, "001-login/spec.md").unwrap();
        let canonical_root = dir.path().canonicalize().unwrap();
        assert_eq!(resolved, canonical_root.join("specs/001-login/spec.md"));
    }

    #[test]
    fn accepts_existing_multi_level_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/d.md"), "x").unwrap();
        let resolved = validate(dir.path(), "a/./b/c/d.md").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("a/b/c/d.md"));
    }

    #[test]
    fn empty_candidate_is_the_base() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(validate(dir.path(), "").unwrap(), canonical);
        assert_eq!(validate(dir.path(), "./.").unwrap(), canonical);
    }

    #[cfg(unix)]
    #[test]
    fn spec_scenarios_on_a_missing_tree() {
        let base = Path::new("/proj/specs");
        assert_eq!(violation(base, "../../etc/passwd"), PathViolation::Traversal);
        assert_eq!(
            validate(base, "001-login/spec.md").unwrap(),
            PathBuf::from("/proj/specs/001-login/spec.md")
        );
    }

    #[cfg(unix)]
    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let base = dir.path().join("specs");
        let evil = dir.path().join("specs-evil");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::create_dir_all(&evil).unwrap();
        symlink(&evil, base.join("link")).unwrap();

        assert_eq!(violation(&base, "link/spec.md"), PathViolation::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_base_is_allowed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("real")).unwrap();
        symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let resolved = validate(dir.path(), "alias/spec.md").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("real/spec.md"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_pointing_outside_is_an_escape() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        symlink(outside.path().join("not-yet"), dir.path().join("trap")).unwrap();

        assert_eq!(violation(dir.path(), "trap"), PathViolation::SymlinkEscape);
        assert_eq!(violation(dir.path(), "trap/deeper.md"), PathViolation::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_fails_closed() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        symlink(dir.path().join("b"), dir.path().join("a")).unwrap();
        symlink(dir.path().join("a"), dir.path().join("b")).unwrap();

        assert_eq!(violation(dir.path(), "a/x"), PathViolation::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_chain_past_hop_limit_is_an_escape() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        // l0 -> l1 -> ... -> l41 -> l42, and l42 does not exist.
        for i in 0..=MAX_LINK_HOPS + 1 {
            symlink(dir.path().join(format!("l{}", i + 1)), dir.path().join(format!("l{i}")))
                .unwrap();
        }
        assert_eq!(violation(dir.path(), "l0"), PathViolation::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn file_used_as_directory_is_io_not_escape() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("spec.md"), "x").unwrap();
        match validate(dir.path(), "spec.md/plan.md") {
            Err(SpecflowError::Io(e)) => assert_ne!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn guard_is_reusable_across_threads() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        std::thread::scope(|s| {
            for i in 0..8 {
                let guard = &guard;
                s.spawn(move || {
                    let p = guard.resolve(&format!("{i:03}-feature/spec.md")).unwrap();
                    assert!(p.starts_with(guard.base()));
                    assert!(guard.resolve("../escape").is_err());
                });
            }
        });
    }
}
