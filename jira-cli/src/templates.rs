// ABOUTME: Issue templates loaded from YAML/JSON files or built-in defaults
// ABOUTME: Merges template fields with overrides and normalizes them into a create payload

use log::debug;
use serde::Serialize;
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConfigurationError, Result};
use crate::fields::FieldResolver;

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const BUG_TEMPLATE: &str = r#"
issuetype: {name: Bug}
priority: {name: High}
labels: [bug]
description: |
  h2. Description

  h2. Steps to Reproduce
  #
  #

  h2. Expected Behavior

  h2. Actual Behavior

  h2. Environment
"#;

const FEATURE_TEMPLATE: &str = r#"
issuetype: {name: Story}
priority: {name: Medium}
labels: [feature, enhancement]
description: |
  h2. User Story
  As a [user type], I want [goal] so that [benefit].

  h2. Acceptance Criteria
  *
  *

  h2. Technical Notes
"#;

const TASK_TEMPLATE: &str = r#"
issuetype: {name: Task}
description: |
  h2. Task Description

  h2. Checklist
  *

  h2. Definition of Done
"#;

pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("bug", BUG_TEMPLATE),
    ("feature", FEATURE_TEMPLATE),
    ("task", TASK_TEMPLATE),
];

/// A template field value. Anything that does not fit one of these shapes is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    EnumRef { name: String },
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

/// Template field name to value, ordered by field name
pub type FieldMapping = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Builtin,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::File(path) => write!(f, "{}", path.display()),
            TemplateSource::Builtin => f.write_str("built-in"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub fields: FieldMapping,
    pub source: TemplateSource,
}

pub struct TemplateResolver {
    dirs: Vec<PathBuf>,
}

impl TemplateResolver {
    /// Directories are searched in order; built-ins are the last resort
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn builtin_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn load(&self, name: &str) -> std::result::Result<Template, ConfigurationError> {
        let not_found = || ConfigurationError::TemplateNotFound {
            name: name.to_string(),
            searched: self.searched_description(),
        };
        if !is_valid_name(name) {
            return Err(not_found());
        }

        for dir in &self.dirs {
            for ext in EXTENSIONS {
                let path = dir.join(format!("{name}.{ext}"));
                if !path.is_file() {
                    continue;
                }
                debug!("Loading template '{}' from {}", name, path.display());
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    ConfigurationError::TemplateParse {
                        name: name.to_string(),
                        reason: format!("cannot read {}: {}", path.display(), e),
                    }
                })?;
                let fields = parse_template(name, &content, *ext == "json")?;
                return Ok(Template {
                    name: name.to_string(),
                    fields,
                    source: TemplateSource::File(path),
                });
            }
        }

        let (_, content) = BUILTIN_TEMPLATES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(not_found)?;
        Ok(Template {
            name: name.to_string(),
            fields: parse_template(name, content, false)?,
            source: TemplateSource::Builtin,
        })
    }

    /// Template fields with overrides applied on top. Keys are replaced whole.
    pub fn resolve(
        &self,
        name: &str,
        overrides: &FieldMapping,
    ) -> std::result::Result<FieldMapping, ConfigurationError> {
        let mut fields = self.load(name)?.fields;
        fields.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(fields)
    }

    /// Every available template name with where it would be loaded from
    pub fn list(&self) -> Vec<(String, TemplateSource)> {
        let mut found: BTreeMap<String, TemplateSource> = BTreeMap::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            paths.sort();
            for path in paths {
                if let Some(name) = template_name(&path) {
                    found.entry(name).or_insert(TemplateSource::File(path));
                }
            }
        }
        for (name, _) in BUILTIN_TEMPLATES {
            found
                .entry(name.to_string())
                .or_insert(TemplateSource::Builtin);
        }
        found.into_iter().collect()
    }

    fn searched_description(&self) -> String {
        let mut searched: Vec<String> = self
            .dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        searched.push("built-in templates".to_string());
        searched.join(", ")
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn template_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !EXTENSIONS.contains(&ext) || !path.is_file() {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_name(stem).then(|| stem.to_string())
}

pub fn parse_template(
    name: &str,
    content: &str,
    is_json: bool,
) -> std::result::Result<FieldMapping, ConfigurationError> {
    let malformed = |reason: String| ConfigurationError::TemplateParse {
        name: name.to_string(),
        reason,
    };

    let document: Value = if is_json {
        serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?
    } else {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?;
        serde_json::to_value(yaml).map_err(|e| malformed(e.to_string()))?
    };

    let Value::Object(map) = document else {
        return Err(malformed("expected a mapping of field names to values".to_string()));
    };

    map.into_iter()
        .map(|(field, value)| -> std::result::Result<(String, FieldValue), ConfigurationError> {
            let value = field_value(&value)
                .ok_or_else(|| malformed(format!("unsupported value for field '{field}'")))?;
            Ok((field, value))
        })
        .collect()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar)
            .collect::<Option<Vec<_>>>()
            .map(FieldValue::List),
        Value::Object(map) if map.len() == 1 => {
            scalar(map.get("name")?).map(|name| FieldValue::EnumRef { name })
        }
        Value::Object(_) | Value::Null => None,
        other => scalar(other).map(FieldValue::Scalar),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn single(key: &str, value: &FieldValue) -> std::result::Result<String, ConfigurationError> {
    match value {
        FieldValue::Scalar(s) | FieldValue::EnumRef { name: s } => Ok(s.clone()),
        FieldValue::List(_) => Err(invalid(key, "expected a single value, got a list")),
    }
}

fn items(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Scalar(s) | FieldValue::EnumRef { name: s } => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        FieldValue::List(list) => list.clone(),
    }
}

fn named_list(value: &FieldValue) -> Value {
    Value::Array(
        items(value)
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect(),
    )
}

/// Convert a template mapping into the tracker's field payload, resolving
/// non-standard field names to ids through `resolver`
pub async fn normalize(mapping: &FieldMapping, resolver: &FieldResolver) -> Result<Map<String, Value>> {
    normalize_layers(&[mapping], resolver).await
}

/// Normalize several mappings into one payload, lowest precedence first. Keys are
/// compared after resolution, so an override naming "Story Points" replaces a
/// template's `customfield_10016` and `type` replaces `issuetype`. Two keys in the
/// same layer naming one field are rejected.
pub async fn normalize_layers(
    layers: &[&FieldMapping],
    resolver: &FieldResolver,
) -> Result<Map<String, Value>> {
    let mut payload = Map::new();

    for layer in layers {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for (key, value) in layer.iter() {
            let (id, normalized) = normalize_field(key, value, resolver).await?;
            if let Some(other) = seen.insert(id.clone(), key.as_str()) {
                return Err(invalid(key, &format!("names the same field as '{other}'")).into());
            }
            payload.insert(id, normalized);
        }
    }

    Ok(payload)
}

async fn normalize_field(
    key: &str,
    value: &FieldValue,
    resolver: &FieldResolver,
) -> Result<(String, Value)> {
    Ok(match key.to_ascii_lowercase().as_str() {
        "issuetype" | "type" => ("issuetype".to_string(), json!({ "name": single(key, value)? })),
        "priority" => ("priority".to_string(), json!({ "name": single(key, value)? })),
        "resolution" => ("resolution".to_string(), json!({ "name": single(key, value)? })),
        "project" => ("project".to_string(), json!({ "key": single(key, value)? })),
        "assignee" => ("assignee".to_string(), json!({ "accountId": single(key, value)? })),
        "reporter" => ("reporter".to_string(), json!({ "accountId": single(key, value)? })),
        "labels" => ("labels".to_string(), json!(items(value))),
        "components" => ("components".to_string(), named_list(value)),
        "fixversions" => ("fixVersions".to_string(), named_list(value)),
        "versions" => ("versions".to_string(), named_list(value)),
        "summary" | "description" | "environment" | "duedate" => {
            (key.to_ascii_lowercase(), Value::String(single(key, value)?))
        }
        _ => {
            let field = resolver.resolve(key).await?;
            (field.id.clone(), custom_value(key, field.schema_type.as_deref(), value)?)
        }
    })
}

fn custom_value(
    key: &str,
    schema_type: Option<&str>,
    value: &FieldValue,
) -> std::result::Result<Value, ConfigurationError> {
    Ok(match (schema_type, value) {
        (_, FieldValue::EnumRef { name }) => json!({ "name": name }),
        (Some("option"), _) => json!({ "value": single(key, value)? }),
        (Some("array"), _) => json!(items(value)),
        (Some("number"), FieldValue::Scalar(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(|n| {
                // Whole numbers stay integers so "5" is sent as 5, not 5.0
                s.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or(Value::Number(n))
            })
            .unwrap_or_else(|| Value::String(s.clone())),
        (_, FieldValue::Scalar(s)) => Value::String(s.clone()),
        (_, FieldValue::List(list)) => json!(list),
    })
}
