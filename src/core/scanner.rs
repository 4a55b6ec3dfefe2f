//! Cartridge file discovery
//!
//! PC folders are scanned recursively; the SD root is scanned one level deep
//! since games on removable media are kept flat. Missing roots yield nothing.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Extension of cartridge image files
pub const XCI_EXTENSION: &str = "xci";

/// Check whether a path looks like a cartridge image
pub fn is_cartridge_file(path: &Path) -> bool {
    path.extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(XCI_EXTENSION))
}

/// Find cartridge files under a directory
///
/// Entries are visited depth-first in file name order. Unreadable entries are
/// skipped.
pub fn find_cartridges(root: &Path, recurse: bool) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!(root = %root.display(), "scan root does not exist");
        return Vec::new();
    }

    let max_depth = if recurse { usize::MAX } else { 1 };

    let found: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_cartridge_file(p))
        .collect();

    debug!(root = %root.display(), recurse, count = found.len(), "scanned for cartridges");
    found
}

/// Scan every PC folder recursively, concatenated in folder order
pub fn scan_pc(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .flat_map(|root| find_cartridges(root, true))
        .collect()
}

/// Scan the top level of the SD root
pub fn scan_sd(root: &Path) -> Vec<PathBuf> {
    find_cartridges(root, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        assert!(scan_pc(&[PathBuf::from("/nonexistent/games")]).is_empty());
        assert!(scan_sd(Path::new("/nonexistent/sd")).is_empty());
    }

    #[test]
    fn test_scan_pc_recurses_in_root_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        touch(&second.join("a.xci"));
        touch(&first.join("nested/deep/z.xci"));
        touch(&first.join("b.XCI"));
        touch(&first.join("notes.txt"));

        let found = scan_pc(&[first.clone(), second.clone()]);

        assert_eq!(
            found,
            vec![
                first.join("b.XCI"),
                first.join("nested/deep/z.xci"),
                second.join("a.xci"),
            ]
        );
    }

    #[test]
    fn test_scan_sd_is_flat() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("mario.xci"));
        touch(&dir.path().join("Nintendo/contents/hidden.xci"));

        let found = scan_sd(dir.path());
        assert_eq!(found, vec![dir.path().join("mario.xci")]);
    }

    #[test]
    fn test_is_cartridge_file() {
        assert!(is_cartridge_file(Path::new("/a/game.xci")));
        assert!(is_cartridge_file(Path::new("/a/GAME.XCI")));
        assert!(!is_cartridge_file(Path::new("/a/game.nsp")));
        assert!(!is_cartridge_file(Path::new("/a/xci")));
    }
}
