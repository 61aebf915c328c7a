//! Path normalization

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current working directory and lexically
/// normalize it. Symlinks are not resolved.
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Remove `.` components and fold `..` into their parent. Leading `..` of a
/// relative path are kept; `..` directly under the root is dropped.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Resolve a `_meta` source entry: entries starting with `.` are relative to
/// `base_dir`, anything else is returned unchanged.
pub fn resolve_source(base_dir: &Path, source: &str) -> PathBuf {
    if source.starts_with('.') {
        normalize(&base_dir.join(source))
    } else {
        PathBuf::from(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dot_components() {
        assert_eq!(normalize(Path::new("/app/config/./extra")), PathBuf::from("/app/config/extra"));
        assert_eq!(normalize(Path::new("/app/config/../shared")), PathBuf::from("/app/shared"));
    }

    #[test]
    fn normalize_keeps_leading_parent_components() {
        assert_eq!(normalize(Path::new("../../x")), PathBuf::from("../../x"));
        assert_eq!(normalize(Path::new("a/../../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("./../x/./y/..")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn resolve_source_only_touches_dot_entries() {
        let base = Path::new("/app/config");
        assert_eq!(resolve_source(base, "./extra"), PathBuf::from("/app/config/extra"));
        assert_eq!(resolve_source(base, "../shared"), PathBuf::from("/app/shared"));
        assert_eq!(resolve_source(base, "/opt/models"), PathBuf::from("/opt/models"));
        assert_eq!(resolve_source(base, "some-package/models"), PathBuf::from("some-package/models"));
    }

    #[test]
    fn absolute_is_rooted() {
        let resolved = absolute(Path::new("config/./models")).expect("absolute");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("config/models"));
    }
}
