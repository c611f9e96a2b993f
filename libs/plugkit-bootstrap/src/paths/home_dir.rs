use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Errors for resolving the host home directory
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("HOME environment variable is not set")]
    HomeMissing,
    #[error("APPDATA environment variable is not set")]
    AppDataMissing,
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the host home directory.
///
/// A configured value may start with `~`, which expands to the user's home
/// (`HOME`, or `USERPROFILE` on Windows); the result must be absolute.
/// Without a configured value the directory is `$HOME/<default_subdir>`
/// (`%APPDATA%/<default_subdir>` on Windows).
///
/// With `create` set, the directory is created if missing.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = resolve_with(config_home, default_subdir, |key| env::var(key).ok())?;
    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

fn resolve_with(
    config_home: Option<String>,
    default_subdir: &str,
    var: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, HomeDirError> {
    let Some(raw) = config_home else {
        let base = if cfg!(target_os = "windows") {
            var("APPDATA").ok_or(HomeDirError::AppDataMissing)?
        } else {
            var("HOME").ok_or(HomeDirError::HomeMissing)?
        };
        return Ok(Path::new(&base).join(default_subdir));
    };

    let expanded = match raw.strip_prefix('~') {
        // "~user" is not supported; the remainder is taken relative to our own home
        Some(rest) => {
            let home = user_home(&var)?;
            let rest = rest.trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                PathBuf::from(home)
            } else {
                Path::new(&home).join(rest)
            }
        }
        None => PathBuf::from(&raw),
    };

    if !expanded.is_absolute() {
        return Err(HomeDirError::AbsoluteRequired(
            expanded.to_string_lossy().into_owned(),
        ));
    }
    Ok(expanded)
}

fn user_home(var: &impl Fn(&str) -> Option<String>) -> Result<String, HomeDirError> {
    if cfg!(target_os = "windows") {
        var("USERPROFILE")
            .or_else(|| var("HOME"))
            .ok_or(HomeDirError::HomeMissing)
    } else {
        var("HOME").ok_or(HomeDirError::HomeMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &Path)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string_lossy().into_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn home_key() -> &'static str {
        if cfg!(target_os = "windows") {
            "USERPROFILE"
        } else {
            "HOME"
        }
    }

    fn default_key() -> &'static str {
        if cfg!(target_os = "windows") {
            "APPDATA"
        } else {
            "HOME"
        }
    }

    #[test]
    fn tilde_expands_to_user_home() {
        let tmp = tempdir().unwrap();
        let var = env_of(&[(home_key(), tmp.path())]);

        let nested = resolve_with(Some("~/plugkit-data".into()), ".plugkit", &var).unwrap();
        assert_eq!(nested, tmp.path().join("plugkit-data"));

        let bare = resolve_with(Some("~".into()), ".plugkit", &var).unwrap();
        assert_eq!(bare, tmp.path());
    }

    #[test]
    fn default_is_subdir_of_platform_base() {
        let tmp = tempdir().unwrap();
        let var = env_of(&[(default_key(), tmp.path())]);
        let result = resolve_with(None, ".plugkit", var).unwrap();
        assert_eq!(result, tmp.path().join(".plugkit"));
    }

    #[test]
    fn absolute_path_is_kept() {
        let tmp = tempdir().unwrap();
        let abs = tmp.path().join("custom_dir");
        let result = resolve_with(Some(abs.to_string_lossy().into_owned()), ".plugkit", |_| None).unwrap();
        assert_eq!(result, abs);
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = resolve_with(Some("relative/path".into()), ".plugkit", |_| None).unwrap_err();
        assert!(matches!(err, HomeDirError::AbsoluteRequired(_)), "got {err:?}");
    }

    #[test]
    fn missing_base_variable_is_an_error() {
        let err = resolve_with(None, ".plugkit", |_| None).unwrap_err();
        if cfg!(target_os = "windows") {
            assert!(matches!(err, HomeDirError::AppDataMissing));
        } else {
            assert!(matches!(err, HomeDirError::HomeMissing));
        }
    }

    #[test]
    fn create_makes_the_directory() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("nested").join("home");
        let result = resolve_home_dir(Some(target.to_string_lossy().into_owned()), ".plugkit", true).unwrap();
        assert!(result.is_dir());
        assert_eq!(result, target);
    }
}
