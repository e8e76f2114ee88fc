//! Catalog path helpers
//!
//! Catalog paths are absolute, forward-slash separated, with no trailing
//! slash. The root collection is `/`.

use icat_common::{Error, Result};

pub const SEPARATOR: char = '/';

/// Normalize an absolute path: collapse repeated separators, resolve `.`
/// and `..`, and drop any trailing separator
pub fn normalize(path: &str) -> Result<String> {
    if !path.starts_with(SEPARATOR) {
        return Err(Error::invalid_argument(format!(
            "path {path:?} is not absolute"
        )));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Resolve `path` against `base`; absolute paths ignore the base
pub fn resolve(base: &str, path: &str) -> Result<String> {
    if path.starts_with(SEPARATOR) {
        normalize(path)
    } else {
        normalize(&format!("{base}/{path}"))
    }
}

#[must_use]
pub fn parent_of(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

#[must_use]
pub fn name_of(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

#[must_use]
pub fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Reject names that are empty, `.`, `..` or contain a path separator
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_argument(format!(
            "{name:?} is not a valid name"
        )));
    }
    if name.contains(SEPARATOR) {
        return Err(Error::invalid_argument(format!(
            "name {name:?} must not contain {SEPARATOR:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use icat_common::ErrorKind;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/tempZone/home/rods/").unwrap(), "/tempZone/home/rods");
        assert_eq!(normalize("//tempZone//home").unwrap(), "/tempZone/home");
        assert_eq!(normalize("/tempZone/home/../trash").unwrap(), "/tempZone/trash");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(
            normalize("tempZone").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            resolve("/tempZone/home", "rods/x").unwrap(),
            "/tempZone/home/rods/x"
        );
        assert_eq!(resolve("/tempZone/home", "../trash").unwrap(), "/tempZone/trash");
        assert_eq!(resolve("/tempZone/home", "/other").unwrap(), "/other");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_of("/tempZone/home/rods"), "/tempZone/home");
        assert_eq!(parent_of("/tempZone"), "/");
        assert_eq!(name_of("/tempZone/home/rods"), "rods");
        assert_eq!(join("/", "tempZone"), "/tempZone");
        assert_eq!(join("/tempZone", "home"), "/tempZone/home");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.csv").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..data").is_ok());
        for name in [".", ".."] {
            assert_eq!(
                validate_name(name).unwrap_err().kind(),
                ErrorKind::InvalidArgument
            );
        }
        assert_eq!(
            validate_name("a/b").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
