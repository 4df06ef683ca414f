use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Expand files and directories into a sorted, de-duplicated list of images.
/// Directories are walked recursively; explicitly named files are kept even
/// if their extension is unknown, so a bad file still gets its slot (and is
/// skipped by the actor).
pub fn collect_images(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for root in roots {
        if root.is_dir() {
            let before = out.len();
            for entry in WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|res| match res {
                    Ok(e) => Some(e),
                    Err(err) => {
                        warn!("walk error: {err}");
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
            {
                if is_image(entry.path()) {
                    out.push(entry.path().to_path_buf());
                }
            }
            info!(root = %root.display(), found = out.len() - before, "scanned directory");
        } else {
            debug!(path = %root.display(), "explicit file");
            out.push(root.clone());
        }
    }
    let mut seen = std::collections::HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    out
}

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "gif", "webp"].contains(&e.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image(Path::new("a/b.JPG")));
        assert!(is_image(Path::new("x.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("noext")));
    }

    #[test]
    fn walks_directories_and_keeps_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        for p in [dir.path().join("b.png"), nested.join("a.jpg"), dir.path().join("skip.txt")] {
            std::fs::write(&p, b"x").unwrap();
        }
        let explicit = dir.path().join("skip.txt");

        let found = collect_images(&[dir.path().to_path_buf(), explicit.clone()]);
        assert_eq!(
            found,
            vec![dir.path().join("b.png"), nested.join("a.jpg"), explicit]
        );
    }
}
