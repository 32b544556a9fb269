//! 🧭 Which files are we importing? One path, a whole data dir, or a glob.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// 🎯 How the caller picked their input files. Exactly one of these, never a mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// 📄 One file, resolved as given, then relative to the data dir.
    File(PathBuf),
    /// 📦 Every `*.zip`, `*.csv`, `*.csv.gz` in the data dir.
    All,
    /// 🌐 A glob, tried as given, then relative to the data dir.
    Glob(String),
}

// -- 🧾 the container shapes `--all` scoops up
const ALL_PATTERNS: [&str; 3] = ["*.zip", "*.csv", "*.csv.gz"];

/// 🧭 Expand a [`FileSelection`] into a sorted list of concrete file paths.
pub fn files_to_process(selection: &FileSelection, data_dir: &Path) -> Result<Vec<PathBuf>> {
    match selection {
        FileSelection::File(path) => Ok(vec![resolve_file_path(path, data_dir)?]),
        FileSelection::All => {
            let mut files = Vec::new();
            for pattern in ALL_PATTERNS {
                files.extend(glob_files(&data_dir.join(pattern).to_string_lossy())?);
            }
            files.sort();
            files.dedup();
            if files.is_empty() {
                bail!(
                    "💀 No .zip, .csv, or .csv.gz files found in '{}'. The hangar is empty.",
                    data_dir.display()
                );
            }
            Ok(files)
        }
        FileSelection::Glob(pattern) => {
            let mut files = glob_files(pattern)?;
            if files.is_empty() && !Path::new(pattern).is_absolute() {
                files = glob_files(&data_dir.join(pattern).to_string_lossy())?;
            }
            files.sort();
            if files.is_empty() {
                bail!("💀 No files found matching pattern: {}", pattern);
            }
            Ok(files)
        }
    }
}

/// 📍 A single path: as given if it exists, else under `data_dir`.
pub fn resolve_file_path(path: &Path, data_dir: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    let the_candidate = data_dir.join(path);
    if the_candidate.exists() {
        return Ok(the_candidate);
    }
    bail!(
        "💀 File not found: '{}' (also tried '{}')",
        path.display(),
        the_candidate.display()
    )
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let the_matches =
        glob::glob(pattern).with_context(|| format!("💀 Invalid glob pattern: {}", pattern))?;
    // -- 🙈 unreadable directory entries are skipped, same as a shell would
    Ok(the_matches
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_fixtures::write_plain;

    #[test]
    fn the_one_where_all_collects_every_container_shape_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_plain(dir.path(), "flights-2024-02.csv.gz", "x");
        write_plain(dir.path(), "flights-2024-01.zip", "x");
        write_plain(dir.path(), "flights-2023.csv", "x");
        write_plain(dir.path(), "notes.txt", "x");

        let the_files = files_to_process(&FileSelection::All, dir.path())?;
        let the_names: Vec<_> = the_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            the_names,
            vec!["flights-2023.csv", "flights-2024-01.zip", "flights-2024-02.csv.gz"]
        );
        Ok(())
    }

    #[test]
    fn the_one_where_relative_paths_fall_back_to_the_data_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_plain(dir.path(), "flights-2019.csv", "x");

        let the_file = files_to_process(
            &FileSelection::File(PathBuf::from("flights-2019.csv")),
            dir.path(),
        )?;
        assert_eq!(the_file, vec![dir.path().join("flights-2019.csv")]);

        let the_globbed = files_to_process(&FileSelection::Glob("flights-20*.csv".into()), dir.path())?;
        assert_eq!(the_globbed, vec![dir.path().join("flights-2019.csv")]);
        Ok(())
    }

    #[test]
    fn the_one_where_an_empty_hangar_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(files_to_process(&FileSelection::All, dir.path()).is_err());
        assert!(files_to_process(&FileSelection::Glob("*.nope".into()), dir.path()).is_err());
        Ok(())
    }
}
