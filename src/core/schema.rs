//! Package descriptor schema validation
//!
//! Checks a raw `build.json` value against the descriptor shape and collects
//! every violation instead of stopping at the first one. Validation never
//! fails by itself: an empty list means the descriptor is valid, and turning
//! a non-empty list into an error is the loader's job.

use std::path::{Component, Path};

use serde_json::{Map, Value};

use crate::config::names::INSTALL_SUBDIR;
use crate::core::expand::{substitute, Bindings};
use crate::core::phase::Phase;
use crate::core::template::Template;
use crate::error::SchemaViolation;

/// Result of validating one descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Violations found, in document order
    pub errors: Vec<SchemaViolation>,
}

impl ValidationResult {
    /// Whether the descriptor had no violations
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(SchemaViolation::new(path, message));
    }
}

/// Validate a raw descriptor value
pub fn validate(descriptor: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    let Some(root) = descriptor.as_object() else {
        result.push("", format!("expected an object, got {}", type_name(descriptor)));
        return result;
    };

    required_string(&mut result, root, "name");
    required_string(&mut result, root, "version");
    if let Some(Value::String(name)) = root.get("name") {
        if let Some(message) = unsafe_name(name) {
            result.push("name", message);
        }
    }
    optional_string(&mut result, root, "source", "source");
    optional_string_array(&mut result, root, "licenses", "licenses");

    if let Some(sha256) = root.get("sha256") {
        match sha256.as_str() {
            Some(hash) if is_sha256(hash) => {}
            Some(_) => result.push("sha256", "expected 64 hexadecimal characters"),
            None => result.push("sha256", expected("a string", sha256)),
        }
    }

    if let Some(template) = root.get("template") {
        match template.as_str().map(str::parse::<Template>) {
            Some(Ok(_)) => {}
            Some(Err(err)) => result.push("template", err.to_string()),
            None => result.push("template", expected("a string", template)),
        }
    }

    if let Some(autoconf) = root.get("autoconf") {
        match autoconf.as_object() {
            Some(section) => optional_string_array(&mut result, section, "flags", "autoconf.flags"),
            None => result.push("autoconf", expected("an object", autoconf)),
        }
    }

    if let Some(build) = root.get("build") {
        match build.as_object() {
            Some(section) => {
                validate_build(&mut result, section, root.get("name"));
                validate_context(&mut result, root, section);
            }
            None => result.push("build", expected("an object", build)),
        }
    }

    result
}

fn validate_build(result: &mut ValidationResult, build: &Map<String, Value>, name: Option<&Value>) {
    optional_string(result, build, "context", "build.context");
    optional_string_array(result, build, "depends", "build.depends");

    if let (Some(Value::Array(depends)), Some(Value::String(name))) = (build.get("depends"), name) {
        if depends.iter().any(|dep| dep.as_str() == Some(name.as_str())) {
            result.push("build.depends", format!("package '{name}' cannot depend on itself"));
        }
    }

    let Some(commands) = build.get("commands") else {
        return;
    };
    let Some(commands) = commands.as_object() else {
        result.push("build.commands", expected("an object", commands));
        return;
    };

    for (phase, list) in commands {
        let path = format!("build.commands.{phase}");
        if let Err(err) = phase.parse::<Phase>() {
            result.push(path, err.to_string());
            continue;
        }
        let Some(list) = list.as_array() else {
            result.push(path, expected("an array", list));
            continue;
        };
        for (index, item) in list.iter().enumerate() {
            validate_command(result, &format!("{path}[{index}]"), item);
        }
    }
}

/// Package names become directory names under the destination
fn unsafe_name(name: &str) -> Option<String> {
    if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name == "." || name == ".." || name.contains(['/', '\\']) {
        Some(format!("'{name}' is not a valid directory name"))
    } else if name == INSTALL_SUBDIR {
        Some(format!("'{name}' is reserved for the shared install directory"))
    } else {
        None
    }
}

/// `build.context` must stay inside the build directory once substituted
fn validate_context(result: &mut ValidationResult, root: &Map<String, Value>, build: &Map<String, Value>) {
    let Some(Value::String(context)) = build.get("context") else {
        return;
    };
    let fields: Bindings = ["name", "version"]
        .into_iter()
        .filter_map(|key| Some((key.to_string(), root.get(key)?.as_str()?.to_string())))
        .collect();
    let resolved = substitute(context, &fields);

    let escapes = resolved.contains('\\')
        || Path::new(&resolved)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        result.push(
            "build.context",
            format!("'{resolved}' must be a relative path inside the build directory"),
        );
    }
}

fn validate_command(result: &mut ValidationResult, path: &str, item: &Value) {
    let command = match item {
        Value::String(_) => return,
        Value::Object(command) => command,
        other => {
            result.push(path, expected("a string or an object", other));
            return;
        }
    };

    match command.get("command") {
        Some(Value::String(_)) => {}
        Some(other) => result.push(format!("{path}.command"), expected("a string", other)),
        None => result.push(format!("{path}.command"), "is required"),
    }

    let Some(env) = command.get("env") else {
        return;
    };
    let Some(env) = env.as_object() else {
        result.push(format!("{path}.env"), expected("an object", env));
        return;
    };
    for (key, value) in env {
        if !value.is_string() {
            result.push(format!("{path}.env.{key}"), expected("a string", value));
        }
    }
}

fn required_string(result: &mut ValidationResult, object: &Map<String, Value>, key: &str) {
    match object.get(key) {
        Some(Value::String(_)) => {}
        Some(other) => result.push(key, expected("a string", other)),
        None => result.push(key, "is required"),
    }
}

fn optional_string(result: &mut ValidationResult, object: &Map<String, Value>, key: &str, path: &str) {
    if let Some(value) = object.get(key) {
        if !value.is_string() {
            result.push(path, expected("a string", value));
        }
    }
}

fn optional_string_array(
    result: &mut ValidationResult,
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) {
    let Some(value) = object.get(key) else {
        return;
    };
    let Some(items) = value.as_array() else {
        result.push(path, expected("an array", value));
        return;
    };
    for (index, item) in items.iter().enumerate() {
        if !item.is_string() {
            result.push(format!("{path}[{index}]"), expected("a string", item));
        }
    }
}

fn is_sha256(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

fn expected(what: &str, got: &Value) -> String {
    format!("expected {what}, got {}", type_name(got))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
