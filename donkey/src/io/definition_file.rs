//! Locating, reading and validating definition files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::core::definition::{Definition, parse_definition};
use crate::error::{Error, Result};

/// Standard file names, in priority order within one directory.
static STANDARD_NAMES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"^donkey\.ya?ml$").unwrap(),
        Regex::new(r"^makefile\.ya?ml$").unwrap(),
    ]
});

/// A validated definition together with where it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    pub path: PathBuf,
    pub definition: Definition,
}

/// Find the closest definition file: `start` first, then each parent.
#[instrument(skip_all, fields(start = %start.display()))]
pub fn find_definition_file(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if let Some(path) = standard_file_in(dir)? {
            debug!(path = %path.display(), "found definition file");
            return Ok(path);
        }
    }
    Err(Error::config(
        "Unable to find definition file with standard name \"donkey.yml\" or \"makefile.yml\" \
         in the current working directory or any parent directory",
    ))
}

fn standard_file_in(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), err = %err, "skipping unreadable directory");
            return Ok(None);
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Error::Io(err.into()))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    for pattern in STANDARD_NAMES.iter() {
        let found = files.iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.is_match(name))
        });
        if let Some(path) = found {
            return Ok(Some(path.clone()));
        }
    }
    Ok(None)
}

/// Read and validate the definition file at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_definition(path: &Path) -> Result<DefinitionFile> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::config(format!(
            "Unable to read definition file \"{}\": {err}",
            path.display()
        ))
    })?;
    parse_definition_file(path, &contents)
}

/// Validate `contents` as the definition file at `path`.
pub fn parse_definition_file(path: &Path, contents: &str) -> Result<DefinitionFile> {
    let raw: serde_yaml::Value = serde_yaml::from_str(contents)
        .map_err(|err| invalid(path, &[format!("invalid YAML: {err}")]))?;
    let definition = parse_definition(&raw).map_err(|errors| invalid(path, &errors))?;
    debug!(groups = definition.groups.len(), "definition file validated");
    Ok(DefinitionFile {
        path: path.to_path_buf(),
        definition,
    })
}

fn invalid(path: &Path, errors: &[String]) -> Error {
    Error::config(format!(
        "Invalid definition file, {}:\n- {}",
        path.display(),
        errors.join("\n- ")
    ))
}

/// Load the file at `explicit` or, if absent, the closest one to `cwd`.
pub fn resolve_definition(explicit: Option<&Path>, cwd: &Path) -> Result<DefinitionFile> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_definition_file(cwd)?,
    };
    load_definition(&path)
}
