use bootshell_core::{Result, ShellError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve `name` to an absolute path to an executable.
///
/// Absolute names are returned as they are. Otherwise every directory of
/// `search_path` is tried in order and, within a directory, every suffix of
/// `[""] ++ extensions`; the first existing executable wins. Relative search
/// directories (and names with a directory component) are taken relative to
/// `cwd`.
pub fn look_path(name: &str, search_path: &str, extensions: &[String], cwd: &Path) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let suffixes: Vec<&str> = std::iter::once("")
        .chain(extensions.iter().map(String::as_str))
        .collect();

    // Names like `./build.sh` or `bin/tool` are never looked up in PATH.
    if path.components().count() > 1 {
        for suffix in &suffixes {
            if let Some(found) = find_executable(&format!("{}{}", name, suffix), cwd, cwd) {
                return Ok(found);
            }
        }
        return Err(ShellError::NotFound {
            name: name.to_string(),
        });
    }

    for dir in std::env::split_paths(search_path) {
        let dir = if dir.as_os_str().is_empty() {
            cwd.to_path_buf()
        } else if dir.is_absolute() {
            dir
        } else {
            cwd.join(dir)
        };

        for suffix in &suffixes {
            let candidate = format!("{}{}", name, suffix);
            if let Some(found) = find_executable(&candidate, &dir, cwd) {
                debug!(name = %name, path = %found.display(), "Resolved executable");
                return Ok(found);
            }
        }
    }

    Err(ShellError::NotFound {
        name: name.to_string(),
    })
}

fn find_executable(candidate: &str, dir: &Path, cwd: &Path) -> Option<PathBuf> {
    let found = which::which_in(candidate, Some(dir), cwd).ok()?;
    if found.is_absolute() {
        Some(found)
    } else {
        Some(cwd.join(found))
    }
}

/// Split a `PATHEXT`-style list into lower-case suffixes with a leading dot.
pub fn parse_extensions(pathext: &str) -> Vec<String> {
    pathext
        .split(';')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            let ext = ext.to_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            }
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn join_paths(dirs: &[&Path]) -> String {
        std::env::join_paths(dirs).unwrap().into_string().unwrap()
    }

    #[test]
    fn test_absolute_name_is_returned_unchanged() {
        let cwd = std::env::current_dir().unwrap();
        // Search path is garbage on purpose: it must not be consulted.
        let found = look_path("/definitely/not/here", "\0", &[], &cwd).unwrap();
        assert_eq!(found, PathBuf::from("/definitely/not/here"));
    }

    #[test]
    fn test_finds_name_in_any_search_directory() {
        let empty_a = TempDir::new().unwrap();
        let empty_b = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let expected = write_executable(bin.path(), "build-tool");

        for order in [
            [bin.path(), empty_a.path(), empty_b.path()],
            [empty_a.path(), bin.path(), empty_b.path()],
            [empty_a.path(), empty_b.path(), bin.path()],
        ] {
            let found = look_path("build-tool", &join_paths(&order), &[], bin.path()).unwrap();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_first_directory_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let expected = write_executable(first.path(), "tool");
        write_executable(second.path(), "tool");

        let found = look_path("tool", &join_paths(&[first.path(), second.path()]), &[], first.path()).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_suffix_is_required_when_only_suffixed_file_exists() {
        let bin = TempDir::new().unwrap();
        let expected = write_executable(bin.path(), "deploy.bat");
        let search = join_paths(&[bin.path()]);

        let err = look_path("deploy", &search, &[], bin.path()).unwrap_err();
        assert!(matches!(err, ShellError::NotFound { ref name } if name == "deploy"));

        let found = look_path("deploy", &search, &[".bat".to_string()], bin.path()).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_relative_search_directory_yields_absolute_path() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("tools")).unwrap();
        let expected = write_executable(&root.path().join("tools"), "lint");

        let found = look_path("lint", "tools", &[], root.path()).unwrap();
        assert!(found.is_absolute());
        assert_eq!(found, expected);
    }

    #[test]
    fn test_non_executable_file_is_skipped() {
        let bin = TempDir::new().unwrap();
        fs::write(bin.path().join("notes"), "not a program").unwrap();
        let search = join_paths(&[bin.path()]);

        assert!(look_path("notes", &search, &[], bin.path()).is_err());
    }

    #[test]
    fn test_parse_extensions() {
        assert_eq!(
            parse_extensions(".COM;.EXE;bat;;"),
            vec![".com".to_string(), ".exe".to_string(), ".bat".to_string()]
        );
        assert!(parse_extensions("").is_empty());
    }
}
