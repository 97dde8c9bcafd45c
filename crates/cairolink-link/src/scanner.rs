use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub module_path: String,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub warnings: Vec<String>,
}

/// Enumerate `*.cairo` files under each root in a stable order. Duplicates
/// across overlapping roots keep their first occurrence; the drop is
/// surfaced as a warning because the module path may not match user intent.
pub fn scan_roots(roots: &[PathBuf], exclude_tests: bool) -> ScanResult {
    let mut result = ScanResult::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in roots {
        if root.is_file() {
            consider(root, root, exclude_tests, &mut seen, &mut result);
            continue;
        }
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                consider(entry.path(), root, exclude_tests, &mut seen, &mut result);
            }
        }
    }

    result
}

fn consider(
    path: &Path,
    root: &Path,
    exclude_tests: bool,
    seen: &mut HashSet<PathBuf>,
    result: &mut ScanResult,
) {
    if path.extension().and_then(|e| e.to_str()) != Some("cairo") {
        return;
    }
    if exclude_tests && is_test_file(path) {
        return;
    }

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(canonical) {
        result.warnings.push(format!(
            "{} already scanned under an earlier root; keeping the first module path",
            path.display()
        ));
        return;
    }

    result.files.push(ScannedFile {
        path: path.to_path_buf(),
        module_path: module_path_for(path, root),
    });
}

/// Test exclusion: `test_*.cairo`, `*_test.cairo`, `tests.cairo`, or any
/// `tests`/`test` path segment.
pub fn is_test_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with("test_") || name.ends_with("_test.cairo") || name == "tests.cairo" {
            return true;
        }
    }
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("tests") | Some("test")
        )
    })
}

/// Derive the `::`-separated module path from a file location.
///
/// The path is taken relative to the innermost `src` directory on the file's
/// ancestor chain, falling back to the supplied root. `lib.cairo` and
/// `mod.cairo` collapse to their parent directory's path.
pub fn module_path_for(path: &Path, root: &Path) -> String {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    // Innermost `src` among the ancestors, never the file itself.
    let src_index = components[..components.len().saturating_sub(1)]
        .iter()
        .rposition(|c| *c == "src");

    let mut tail: Vec<&str> = match src_index {
        Some(idx) => components[idx + 1..].to_vec(),
        None => {
            let relative = path.strip_prefix(root).unwrap_or(path);
            relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect()
        }
    };
    // A file passed directly as a root strips down to nothing; fall back to
    // its own name.
    if tail.is_empty() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            tail.push(name);
        }
    }

    let mut segments: Vec<String> = tail
        .iter()
        .take(tail.len().saturating_sub(1))
        .map(|s| s.to_string())
        .collect();

    if let Some(file) = tail.last() {
        let stem = file.strip_suffix(".cairo").unwrap_or(file);
        if stem != "lib" && stem != "mod" {
            segments.push(stem.to_string());
        }
    }

    segments.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_path_is_relative_to_innermost_src() {
        let path = Path::new("/work/project/src/math/delta.cairo");
        let root = Path::new("/work/project");
        assert_eq!(module_path_for(path, root), "math::delta");
    }

    #[test]
    fn nested_src_uses_the_innermost_one() {
        let path = Path::new("/work/src/vendor/src/core/util.cairo");
        let root = Path::new("/work");
        assert_eq!(module_path_for(path, root), "core::util");
    }

    #[test]
    fn lib_and_mod_collapse_to_parent() {
        let root = Path::new("/p");
        assert_eq!(
            module_path_for(Path::new("/p/src/math/mod.cairo"), root),
            "math"
        );
        assert_eq!(module_path_for(Path::new("/p/src/lib.cairo"), root), "");
    }

    #[test]
    fn no_src_falls_back_to_root_relative() {
        let path = Path::new("/p/contracts/token.cairo");
        let root = Path::new("/p");
        assert_eq!(module_path_for(path, root), "contracts::token");
    }

    #[test]
    fn test_files_are_recognized() {
        assert!(is_test_file(Path::new("/p/src/test_token.cairo")));
        assert!(is_test_file(Path::new("/p/src/token_test.cairo")));
        assert!(is_test_file(Path::new("/p/src/tests.cairo")));
        assert!(is_test_file(Path::new("/p/tests/token.cairo")));
        assert!(is_test_file(Path::new("/p/test/deep/token.cairo")));
        assert!(!is_test_file(Path::new("/p/src/token.cairo")));
        assert!(!is_test_file(Path::new("/p/src/attestation.cairo")));
    }
}
