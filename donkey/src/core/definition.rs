//! Typed definition document and its validation pass.
//!
//! A definition is a YAML mapping of group names to shell lines, plus three
//! reserved top-level keys:
//!
//! ```yaml
//! .default: build
//! .settings:
//!   PROFILE: release
//! .config:
//!   interpreter: bash
//!   parallel: false
//!   script: false
//!
//! build:
//! - cargo build
//! lint:
//!   parallel: true
//!   settings:
//!     RUSTFLAGS: -Dwarnings
//!   run:
//!   - cargo clippy
//!   - cargo fmt --check
//! ```
//!
//! Validation never stops at the first problem: every violation is collected
//! so the user can fix the whole file in one pass.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

pub const DEFAULT_KEY: &str = ".default";
pub const SETTINGS_KEY: &str = ".settings";
pub const CONFIG_KEY: &str = ".config";

/// String settings exported to child processes as environment variables.
pub type Settings = BTreeMap<String, String>;

/// Execution options shared by the `.config` block and group mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOptions {
    pub interpreter: Option<String>,
    pub parallel: Option<bool>,
    #[serde(rename = "script")]
    pub script_mode: Option<bool>,
}

/// The object form of a group.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSpec {
    interpreter: Option<String>,
    parallel: Option<bool>,
    #[serde(rename = "script")]
    script_mode: Option<bool>,
    #[serde(default)]
    settings: Settings,
    run: Vec<String>,
}

/// One named group of shell lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefinition {
    pub name: String,
    pub run: Vec<String>,
    pub settings: Settings,
    pub parallel: Option<bool>,
    pub interpreter: Option<String>,
    pub script_mode: Option<bool>,
}

impl GroupDefinition {
    /// Group in its bare-list form: lines only, everything else inherited.
    pub fn from_lines(name: &str, run: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            run,
            settings: Settings::new(),
            parallel: None,
            interpreter: None,
            script_mode: None,
        }
    }
}

/// A validated definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definition {
    pub default_group: Option<String>,
    pub settings: Settings,
    pub config: ConfigOptions,
    /// Groups in document order.
    pub groups: Vec<GroupDefinition>,
}

impl Definition {
    pub fn group(&self, name: &str) -> Option<&GroupDefinition> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.name.as_str()).collect()
    }
}

/// Validate a parsed YAML document into a [`Definition`].
///
/// Returns every violation found, each prefixed with the path of the
/// offending key.
pub fn parse_definition(raw: &Value) -> Result<Definition, Vec<String>> {
    let mut errors = Vec::new();
    let root = match raw {
        Value::Mapping(map) => map,
        Value::Null => {
            return Err(vec!["definition is empty".to_string()]);
        }
        other => {
            return Err(vec![format!(
                "definition must be a mapping of group names, got {}",
                describe(other)
            )]);
        }
    };

    let mut definition = Definition::default();
    for (key, value) in root {
        let Some(key) = key.as_str() else {
            errors.push(format!("{}: keys must be strings", describe_key(key)));
            continue;
        };
        match key {
            DEFAULT_KEY => match value {
                Value::String(name) => definition.default_group = Some(name.clone()),
                other => errors.push(format!(
                    "{DEFAULT_KEY}: expected a group name, got {}",
                    describe(other)
                )),
            },
            SETTINGS_KEY => {
                if let Some(settings) = parse_settings(SETTINGS_KEY, value, &mut errors) {
                    definition.settings = settings;
                }
            }
            CONFIG_KEY => match serde_yaml::from_value::<ConfigOptions>(value.clone()) {
                Ok(config) => {
                    check_interpreter(CONFIG_KEY, config.interpreter.as_deref(), &mut errors);
                    definition.config = config;
                }
                Err(err) => errors.push(format!("{CONFIG_KEY}: {err}")),
            },
            reserved if reserved.starts_with('.') => {
                errors.push(format!(
                    "{reserved}: unknown reserved key, expected one of {DEFAULT_KEY}, {SETTINGS_KEY}, {CONFIG_KEY}"
                ));
            }
            name => {
                if let Some(group) = parse_group(name, value, &mut errors) {
                    definition.groups.push(group);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(definition)
    } else {
        Err(errors)
    }
}

fn parse_group(name: &str, value: &Value, errors: &mut Vec<String>) -> Option<GroupDefinition> {
    let group = match value {
        Value::Sequence(_) => match serde_yaml::from_value::<Vec<String>>(value.clone()) {
            Ok(run) => GroupDefinition::from_lines(name, run),
            Err(err) => {
                errors.push(format!("{name}: {err}"));
                return None;
            }
        },
        Value::Mapping(_) => match serde_yaml::from_value::<GroupSpec>(value.clone()) {
            Ok(spec) => {
                check_interpreter(name, spec.interpreter.as_deref(), errors);
                check_setting_names(&format!("{name}.settings"), &spec.settings, errors);
                GroupDefinition {
                    name: name.to_string(),
                    run: spec.run,
                    settings: spec.settings,
                    parallel: spec.parallel,
                    interpreter: spec.interpreter,
                    script_mode: spec.script_mode,
                }
            }
            Err(err) => {
                errors.push(format!("{name}: {err}"));
                return None;
            }
        },
        other => {
            errors.push(format!(
                "{name}: expected a list of commands or a mapping with \"run\", got {}",
                describe(other)
            ));
            return None;
        }
    };

    if group.run.is_empty() {
        errors.push(format!("{name}: run must contain at least one command"));
        return None;
    }
    Some(group)
}

fn parse_settings(path: &str, value: &Value, errors: &mut Vec<String>) -> Option<Settings> {
    match serde_yaml::from_value::<Settings>(value.clone()) {
        Ok(settings) => {
            check_setting_names(path, &settings, errors);
            Some(settings)
        }
        Err(err) => {
            errors.push(format!("{path}: {err}"));
            None
        }
    }
}

/// Settings become environment variables, so names must be usable as such.
fn check_setting_names(path: &str, settings: &Settings, errors: &mut Vec<String>) {
    for name in settings.keys() {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            errors.push(format!(
                "{path}: \"{name}\" is not a valid environment variable name"
            ));
        }
    }
}

fn check_interpreter(path: &str, interpreter: Option<&str>, errors: &mut Vec<String>) {
    if let Some(interpreter) = interpreter
        && interpreter.trim().is_empty()
    {
        errors.push(format!("{path}: interpreter must not be empty"));
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => describe(other).to_string(),
    }
}
