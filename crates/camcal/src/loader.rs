use crate::CalibError;
use glob::Pattern;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Files in `dir` whose name matches the glob `pattern`, sorted by path.
///
/// Symlinks to files are listed, subdirectories are not searched. A missing
/// directory yields an empty list.
pub fn list_images(dir: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>, CalibError> {
    let dir = dir.as_ref();
    let matcher = Pattern::new(pattern)?;

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("image folder {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_str().is_some_and(|n| matcher.matches(n)) {
            continue;
        }
        // Follows symlinks; dangling links are dropped.
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    debug!(
        "{} file(s) in {} match {:?}",
        paths.len(),
        dir.display(),
        pattern
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").expect("write");
    }

    #[test]
    fn lists_matching_files_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["c.jpg", "a.jpg", "b.png", "b.jpg"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.jpg")).expect("mkdir");

        let paths = list_images(dir.path(), "*.jpg").expect("list");
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().and_then(|n| n.to_str()).unwrap_or_default())
            .collect();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn empty_or_missing_folder_gives_empty_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(list_images(dir.path(), "*.jpg").expect("list").is_empty());
        touch(dir.path(), "notes.txt");
        assert!(list_images(dir.path(), "*.jpg").expect("list").is_empty());
        assert!(list_images(dir.path().join("missing"), "*.jpg")
            .expect("list")
            .is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_images_are_listed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "plain.jpg");
        touch(store.path(), "target.jpg");
        std::os::unix::fs::symlink(store.path().join("target.jpg"), dir.path().join("linked.jpg"))
            .expect("symlink");
        std::os::unix::fs::symlink(store.path().join("gone.jpg"), dir.path().join("dangling.jpg"))
            .expect("symlink");

        let paths = list_images(dir.path(), "*.jpg").expect("list");
        assert_eq!(
            paths,
            [dir.path().join("linked.jpg"), dir.path().join("plain.jpg")]
        );
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = list_images(dir.path(), "[*.jpg").unwrap_err();
        assert!(matches!(err, CalibError::Pattern(_)));
    }
}
