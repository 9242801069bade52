//! Safety checks before the report replaces an existing file.
//!
//! The report is written over its previous version on every run, so a
//! mistyped argument could otherwise clobber the source dataset.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output must have the required extension (e.g. "json")
/// - Output cannot be the same file as any of the provided source paths
pub fn validate_output_path(output: &Path, required_extension: &str, source_paths: &[&Path]) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extension.eq_ignore_ascii_case(required_extension) {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            required_extension
        );
    }

    for source in source_paths {
        if same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}

/// Validates that a lyrics directory is safe to replace wholesale.
///
/// The directory is rebuilt from scratch on every run, so it must not
/// contain (or be) any of the protected paths.
pub fn validate_lyrics_dir(dir: &Path, protected: &[&Path]) -> Result<()> {
    let dir = resolve(dir);
    for path in protected {
        if resolve(path).starts_with(&dir) {
            bail!(
                "Safety check failed: lyrics directory '{}' contains '{}' and is replaced on every run",
                dir.display(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Absolute form of `path`, canonicalized through its nearest existing
/// ancestor so aliases like `./x` and `x` compare equal.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Path equality, resolved through the filesystem when both paths exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/data.json");
        let source = PathBuf::from("/data/all_songs_data.csv");
        assert!(validate_output_path(&output, "json", &[&source]).is_ok());
    }

    #[test]
    fn test_wrong_extension() {
        let output = PathBuf::from("/data/all_songs_data.csv");
        let result = validate_output_path(&output, "json", &[]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must have a .json extension"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/songs.json");
        let result = validate_output_path(&path, "json", &[&path]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_lyrics_dir_must_not_hold_inputs_or_report() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("songs.csv");
        std::fs::write(&source, "Rank\n").unwrap();
        let report = dir.path().join("out/data.json");

        assert!(validate_lyrics_dir(dir.path(), &[&source, &report]).is_err());
        assert!(validate_lyrics_dir(&dir.path().join("out"), &[&source, &report]).is_err());
        assert!(validate_lyrics_dir(&dir.path().join("."), &[&source]).is_err());
        assert!(validate_lyrics_dir(&dir.path().join("lyrics"), &[&source, &report]).is_ok());
    }

    #[test]
    fn test_same_file_through_different_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("songs.json");
        std::fs::write(&source, "{}").unwrap();
        let aliased = dir.path().join(".").join("songs.json");
        assert!(validate_output_path(&aliased, "json", &[&source]).is_err());
    }
}
