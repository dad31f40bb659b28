// Declarative JSON schemas for inbound requests and upstream responses.
//
// A `Schema` parses a `serde_json::Value` into a normalized `Value`: unknown
// object keys are stripped, passed through or rejected per object, and in
// `Mode::Coerce` string inputs (path segments, query values) are converted
// to the declared scalar type. `Mode::Response` checks types as strictly as
// `Mode::Strict` but never drops a key the upstream sent.

pub mod shared;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    Null,
    Bool,
    Integer { min: Option<i64>, max: Option<i64> },
    Number,
    String(StringRules),
    Literal(Value),
    Enum(Vec<String>),
    Array { items: Box<Schema>, min_items: Option<usize>, max_items: Option<usize> },
    Object(ObjectSchema),
    Nullable(Box<Schema>),
    Union(Vec<Schema>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uuid,
    Url,
    /// Exactly `n` ASCII digits (one-time codes)
    Digits(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub fields: Vec<Field>,
    pub unknown: UnknownKeys,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// What an object does with keys it does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    Strip,
    Passthrough,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Coerce,
    /// Strict typing; unknown keys and explicit nulls on optional fields are kept as received
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    InvalidType,
    InvalidJson,
    TooShort,
    TooLong,
    TooSmall,
    TooBig,
    InvalidFormat,
    InvalidEnum,
    InvalidLiteral,
    InvalidUnion,
    UnknownKey,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::Required => "required",
            IssueCode::InvalidType => "invalid_type",
            IssueCode::InvalidJson => "invalid_json",
            IssueCode::TooShort => "too_short",
            IssueCode::TooLong => "too_long",
            IssueCode::TooSmall => "too_small",
            IssueCode::TooBig => "too_big",
            IssueCode::InvalidFormat => "invalid_format",
            IssueCode::InvalidEnum => "invalid_enum",
            IssueCode::InvalidLiteral => "invalid_literal",
            IssueCode::InvalidUnion => "invalid_union",
            IssueCode::UnknownKey => "unknown_key",
        }
    }
}

/// A single schema violation, addressed by a dotted path (`tags.0`, `meta.secret`)
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub path: String,
    pub code: IssueCode,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }

    /// Path relative to the validated document; `None` at the root
    pub fn param(&self) -> Option<&str> {
        if self.path.is_empty() {
            None
        } else {
            Some(&self.path)
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param() {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

// Builders
impl Schema {
    pub fn any() -> Self {
        Schema::Any
    }

    pub fn null() -> Self {
        Schema::Null
    }

    pub fn boolean() -> Self {
        Schema::Bool
    }

    pub fn integer() -> Self {
        Schema::Integer { min: None, max: None }
    }

    pub fn number() -> Self {
        Schema::Number
    }

    pub fn string() -> Self {
        Schema::String(StringRules::default())
    }

    pub fn email() -> Self {
        Self::formatted(StringFormat::Email)
    }

    pub fn uuid() -> Self {
        Self::formatted(StringFormat::Uuid)
    }

    pub fn url() -> Self {
        Self::formatted(StringFormat::Url)
    }

    pub fn digits(len: usize) -> Self {
        Self::formatted(StringFormat::Digits(len))
    }

    fn formatted(format: StringFormat) -> Self {
        Schema::String(StringRules {
            format: Some(format),
            ..StringRules::default()
        })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn one_of(values: &[&str]) -> Self {
        Schema::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn array_of(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// An empty object that strips undeclared keys
    pub fn object() -> Self {
        Schema::Object(ObjectSchema {
            fields: Vec::new(),
            unknown: UnknownKeys::Strip,
        })
    }

    pub fn union(variants: Vec<Schema>) -> Self {
        Schema::Union(variants)
    }

    pub fn field(self, name: &str, schema: Schema) -> Self {
        self.push_field(name, schema, true)
    }

    pub fn optional(self, name: &str, schema: Schema) -> Self {
        self.push_field(name, schema, false)
    }

    fn push_field(mut self, name: &str, schema: Schema, required: bool) -> Self {
        if let Schema::Object(object) = &mut self {
            object.fields.retain(|f| f.name != name);
            object.fields.push(Field {
                name: name.to_string(),
                schema,
                required,
            });
        }
        self
    }

    pub fn passthrough(self) -> Self {
        self.unknown_keys(UnknownKeys::Passthrough)
    }

    pub fn strict(self) -> Self {
        self.unknown_keys(UnknownKeys::Reject)
    }

    fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        if let Schema::Object(object) = &mut self {
            object.unknown = policy;
        }
        self
    }

    pub fn nullable(self) -> Self {
        match self {
            Schema::Nullable(_) => self,
            other => Schema::Nullable(Box::new(other)),
        }
    }

    /// Lower bound: value for integers, length for strings, item count for arrays
    pub fn min(mut self, bound: usize) -> Self {
        match &mut self {
            Schema::Integer { min, .. } => *min = Some(bound as i64),
            Schema::String(rules) => rules.min_len = Some(bound),
            Schema::Array { min_items, .. } => *min_items = Some(bound),
            _ => {}
        }
        self
    }

    /// Upper bound: value for integers, length for strings, item count for arrays
    pub fn max(mut self, bound: usize) -> Self {
        match &mut self {
            Schema::Integer { max, .. } => *max = Some(bound as i64),
            Schema::String(rules) => rules.max_len = Some(bound),
            Schema::Array { max_items, .. } => *max_items = Some(bound),
            _ => {}
        }
        self
    }

    /// Field names declared on an object schema
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Schema::Object(object) => object.fields.iter().map(|f| f.name.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    fn accepts_null(&self) -> bool {
        matches!(self, Schema::Null | Schema::Any | Schema::Nullable(_))
    }

    fn type_name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Null => "null",
            Schema::Bool => "boolean",
            Schema::Integer { .. } => "integer",
            Schema::Number => "number",
            Schema::String(_) | Schema::Enum(_) => "string",
            Schema::Literal(_) => "literal",
            Schema::Array { .. } => "array",
            Schema::Object(_) => "object",
            Schema::Nullable(inner) => inner.type_name(),
            Schema::Union(_) => "union",
        }
    }
}

// Parsing
impl Schema {
    pub fn parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        self.parse_with(input, Mode::Strict)
    }

    pub fn parse_with(&self, input: &Value, mode: Mode) -> Result<Value, Vec<Issue>> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        match self.check(input, mode, &mut path, &mut issues) {
            Some(value) if issues.is_empty() => Ok(value),
            _ => Err(issues),
        }
    }

    fn check(
        &self,
        input: &Value,
        mode: Mode,
        path: &mut Vec<String>,
        issues: &mut Vec<Issue>,
    ) -> Option<Value> {
        match self {
            Schema::Any => Some(input.clone()),
            Schema::Null => match input {
                Value::Null => Some(Value::Null),
                other => invalid_type(self, other, path, issues),
            },
            Schema::Nullable(inner) => match input {
                Value::Null => Some(Value::Null),
                other => inner.check(other, mode, path, issues),
            },
            Schema::Bool => match (input, mode) {
                (Value::Bool(b), _) => Some(Value::Bool(*b)),
                (Value::String(s), Mode::Coerce) => match s.as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => invalid_type(self, input, path, issues),
                },
                (other, _) => invalid_type(self, other, path, issues),
            },
            Schema::Integer { min, max } => {
                let value = match (input, mode) {
                    (Value::Number(n), _) => n.as_i64(),
                    (Value::String(s), Mode::Coerce) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(value) = value else {
                    return invalid_type(self, input, path, issues);
                };
                if let Some(min) = min {
                    if value < *min {
                        issues.push(Issue::new(
                            join(path),
                            IssueCode::TooSmall,
                            format!("Must be greater than or equal to {}", min),
                        ));
                        return None;
                    }
                }
                if let Some(max) = max {
                    if value > *max {
                        issues.push(Issue::new(
                            join(path),
                            IssueCode::TooBig,
                            format!("Must be less than or equal to {}", max),
                        ));
                        return None;
                    }
                }
                Some(Value::from(value))
            }
            Schema::Number => match (input, mode) {
                (Value::Number(n), _) => Some(Value::Number(n.clone())),
                (Value::String(s), Mode::Coerce) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                    Some(n) => Some(Value::Number(n)),
                    None => invalid_type(self, input, path, issues),
                },
                (other, _) => invalid_type(self, other, path, issues),
            },
            Schema::String(rules) => match input {
                Value::String(s) => check_string(s, rules, path, issues),
                other => invalid_type(self, other, path, issues),
            },
            Schema::Literal(expected) => {
                let matches = match (expected, input, mode) {
                    (expected, input, _) if expected == input => true,
                    (Value::Number(n), Value::String(s), Mode::Coerce) => n.to_string() == *s,
                    (Value::Bool(b), Value::String(s), Mode::Coerce) => b.to_string() == *s,
                    _ => false,
                };
                if matches {
                    Some(expected.clone())
                } else {
                    issues.push(Issue::new(
                        join(path),
                        IssueCode::InvalidLiteral,
                        format!("Expected {}", expected),
                    ));
                    None
                }
            }
            Schema::Enum(allowed) => match input {
                Value::String(s) if allowed.iter().any(|a| a == s) => Some(input.clone()),
                Value::String(_) => {
                    issues.push(Issue::new(
                        join(path),
                        IssueCode::InvalidEnum,
                        format!("Expected one of: {}", allowed.join(", ")),
                    ));
                    None
                }
                other => invalid_type(self, other, path, issues),
            },
            Schema::Array { items, min_items, max_items } => {
                let elements: Vec<Value> = match (input, mode) {
                    (Value::Array(elements), _) => elements.clone(),
                    // a single query value stands for a one-element list
                    (other, Mode::Coerce) if !other.is_null() => vec![other.clone()],
                    (other, _) => return invalid_type(self, other, path, issues),
                };
                if let Some(min) = min_items {
                    if elements.len() < *min {
                        issues.push(Issue::new(
                            join(path),
                            IssueCode::TooSmall,
                            format!("Must contain at least {} item(s)", min),
                        ));
                        return None;
                    }
                }
                if let Some(max) = max_items {
                    if elements.len() > *max {
                        issues.push(Issue::new(
                            join(path),
                            IssueCode::TooBig,
                            format!("Must contain at most {} item(s)", max),
                        ));
                        return None;
                    }
                }
                let mut out = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    path.push(index.to_string());
                    if let Some(value) = items.check(element, mode, path, issues) {
                        out.push(value);
                    }
                    path.pop();
                }
                Some(Value::Array(out))
            }
            Schema::Object(object) => match input {
                Value::Object(map) => check_object(object, map, mode, path, issues),
                other => invalid_type(self, other, path, issues),
            },
            Schema::Union(variants) => {
                for variant in variants {
                    let mut scratch = Vec::new();
                    if let Some(value) = variant.check(input, mode, path, &mut scratch) {
                        if scratch.is_empty() {
                            return Some(value);
                        }
                    }
                }
                issues.push(Issue::new(
                    join(path),
                    IssueCode::InvalidUnion,
                    "Value does not match any allowed shape",
                ));
                None
            }
        }
    }
}

fn check_object(
    object: &ObjectSchema,
    map: &Map<String, Value>,
    mode: Mode,
    path: &mut Vec<String>,
    issues: &mut Vec<Issue>,
) -> Option<Value> {
    let mut out = Map::new();

    for field in &object.fields {
        path.push(field.name.clone());
        match map.get(&field.name) {
            None => {
                if field.required {
                    issues.push(Issue::new(join(path), IssueCode::Required, "This field is required"));
                }
            }
            Some(Value::Null) if !field.required && !field.schema.accepts_null() => {
                // optional fields tolerate an explicit null; inbound input drops it
                if mode == Mode::Response {
                    out.insert(field.name.clone(), Value::Null);
                }
            }
            Some(value) => {
                if let Some(parsed) = field.schema.check(value, mode, path, issues) {
                    out.insert(field.name.clone(), parsed);
                }
            }
        }
        path.pop();
    }

    for (key, value) in map {
        if object.fields.iter().any(|f| &f.name == key) {
            continue;
        }
        match object.unknown {
            UnknownKeys::Strip if mode != Mode::Response => {}
            UnknownKeys::Strip | UnknownKeys::Passthrough => {
                out.insert(key.clone(), value.clone());
            }
            UnknownKeys::Reject => {
                path.push(key.clone());
                issues.push(Issue::new(join(path), IssueCode::UnknownKey, "Unknown field"));
                path.pop();
            }
        }
    }

    Some(Value::Object(out))
}

fn check_string(s: &str, rules: &StringRules, path: &[String], issues: &mut Vec<Issue>) -> Option<Value> {
    let len = s.chars().count();
    if let Some(min) = rules.min_len {
        if len < min {
            let message = if min == 1 {
                "This field may not be blank".to_string()
            } else {
                format!("Must be at least {} characters", min)
            };
            issues.push(Issue::new(join(path), IssueCode::TooShort, message));
            return None;
        }
    }
    if let Some(max) = rules.max_len {
        if len > max {
            issues.push(Issue::new(
                join(path),
                IssueCode::TooLong,
                format!("Must be at most {} characters", max),
            ));
            return None;
        }
    }
    if let Some(format) = rules.format {
        if let Err(message) = check_format(s, format) {
            issues.push(Issue::new(join(path), IssueCode::InvalidFormat, message));
            return None;
        }
    }
    Some(Value::String(s.to_string()))
}

fn check_format(s: &str, format: StringFormat) -> Result<(), String> {
    match format {
        StringFormat::Email => {
            if is_email(s) {
                Ok(())
            } else {
                Err("Enter a valid email address".to_string())
            }
        }
        StringFormat::Uuid => uuid::Uuid::parse_str(s)
            .map(|_| ())
            .map_err(|_| "Enter a valid UUID".to_string()),
        StringFormat::Url => match url::Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "otpauth") => Ok(()),
            _ => Err("Enter a valid URL".to_string()),
        },
        StringFormat::Digits(n) => {
            if s.len() == n && s.bytes().all(|b| b.is_ascii_digit()) {
                Ok(())
            } else {
                Err(format!("Must be exactly {} digits", n))
            }
        }
    }
}

fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

fn invalid_type(schema: &Schema, got: &Value, path: &[String], issues: &mut Vec<Issue>) -> Option<Value> {
    issues.push(Issue::new(
        join(path),
        IssueCode::InvalidType,
        format!("Expected {}, received {}", schema.type_name(), value_kind(got)),
    ));
    None
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &[String]) -> String {
    path.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signup() -> Schema {
        Schema::object()
            .field("email", Schema::email())
            .field("password", Schema::string().min(8))
            .optional("username", Schema::string().min(1).max(150))
    }

    #[test]
    fn test_valid_object_strips_unknown_keys() {
        let parsed = signup()
            .parse(&json!({"email": "a@example.com", "password": "hunter2hunter2", "admin": true}))
            .unwrap();
        assert_eq!(parsed, json!({"email": "a@example.com", "password": "hunter2hunter2"}));
    }

    #[test]
    fn test_collects_every_issue_with_paths() {
        let issues = signup().parse(&json!({"email": "not-an-email", "username": ""})).unwrap_err();
        let paths: Vec<_> = issues.iter().map(|i| (i.path.as_str(), i.code)).collect();
        assert_eq!(
            paths,
            vec![
                ("email", IssueCode::InvalidFormat),
                ("password", IssueCode::Required),
                ("username", IssueCode::TooShort),
            ]
        );
    }

    #[test]
    fn test_email_format() {
        for good in ["a@example.com", "first.last+tag@sub.example.co.uk"] {
            assert!(is_email(good), "{good}");
        }
        for bad in ["not-an-email", "a@b", "@example.com", "a b@example.com", "a@@example.com", "a@-x.com"] {
            assert!(!is_email(bad), "{bad}");
        }
    }

    #[test]
    fn test_coerce_mode_converts_query_strings() {
        let schema = Schema::object()
            .optional("page", Schema::integer().min(1))
            .optional("unread", Schema::boolean())
            .optional("tag", Schema::array_of(Schema::string()));
        let parsed = schema
            .parse_with(&json!({"page": "3", "unread": "true", "tag": "rust"}), Mode::Coerce)
            .unwrap();
        assert_eq!(parsed, json!({"page": 3, "unread": true, "tag": ["rust"]}));

        let issues = schema.parse(&json!({"page": "3"})).unwrap_err();
        assert_eq!(issues[0].code, IssueCode::InvalidType);
    }

    #[test]
    fn test_integer_bounds() {
        let schema = Schema::integer().min(1).max(100);
        assert_eq!(schema.parse(&json!(0)).unwrap_err()[0].code, IssueCode::TooSmall);
        assert_eq!(schema.parse(&json!(101)).unwrap_err()[0].code, IssueCode::TooBig);
        assert_eq!(schema.parse(&json!(1.5)).unwrap_err()[0].code, IssueCode::InvalidType);
        assert_eq!(schema.parse(&json!(42)).unwrap(), json!(42));
    }

    #[test]
    fn test_passthrough_keeps_extra_keys() {
        let schema = Schema::object().field("status", Schema::integer()).passthrough();
        let input = json!({"status": 200, "data": {"anything": [1, 2]}});
        assert_eq!(schema.parse(&input).unwrap(), input);
    }

    #[test]
    fn test_strict_rejects_extra_keys() {
        let schema = Schema::object().field("code", Schema::digits(6)).strict();
        let issues = schema.parse(&json!({"code": "123456", "extra": 1})).unwrap_err();
        assert_eq!(issues[0].path, "extra");
        assert_eq!(issues[0].code, IssueCode::UnknownKey);
    }

    #[test]
    fn test_nested_array_paths() {
        let schema = Schema::object().field("sessions", Schema::array_of(Schema::integer()).min(1));
        let issues = schema.parse(&json!({"sessions": [1, "two"]})).unwrap_err();
        assert_eq!(issues[0].path, "sessions.1");
        assert_eq!(schema.parse(&json!({"sessions": []})).unwrap_err()[0].code, IssueCode::TooSmall);
    }

    #[test]
    fn test_nullable_and_optional_null() {
        let schema = Schema::object()
            .field("last_login", Schema::string().nullable())
            .optional("nickname", Schema::string());
        let parsed = schema.parse(&json!({"last_login": null, "nickname": null})).unwrap();
        assert_eq!(parsed, json!({"last_login": null}));
    }

    #[test]
    fn test_response_mode_keeps_optional_null() {
        let schema = Schema::object()
            .field("id", Schema::integer())
            .optional("nickname", Schema::string())
            .optional("profile", Schema::object().optional("bio", Schema::string()).passthrough());
        let input = json!({"id": 1, "nickname": null, "profile": {"bio": null, "extra": [null]}});

        assert_eq!(
            schema.parse_with(&input, Mode::Response).unwrap(),
            json!({"id": 1, "nickname": null, "profile": {"bio": null, "extra": [null]}})
        );
        assert!(schema.parse_with(&json!({"id": "1"}), Mode::Response).is_err());

        let stripping = Schema::object().field("id", Schema::integer());
        assert_eq!(stripping.parse(&json!({"id": 1, "x": null})).unwrap(), json!({"id": 1}));
        assert_eq!(
            stripping.parse_with(&json!({"id": 1, "x": null}), Mode::Response).unwrap(),
            json!({"id": 1, "x": null})
        );
    }

    #[test]
    fn test_union_and_literal() {
        let schema = Schema::union(vec![Schema::literal(200), Schema::literal(201)]);
        assert!(schema.parse(&json!(201)).is_ok());
        assert_eq!(schema.parse(&json!(204)).unwrap_err()[0].code, IssueCode::InvalidUnion);
    }

    #[test]
    fn test_enum_and_digits() {
        let kind = Schema::one_of(&["totp", "recovery_codes"]);
        assert!(kind.parse(&json!("totp")).is_ok());
        assert_eq!(kind.parse(&json!("sms")).unwrap_err()[0].code, IssueCode::InvalidEnum);

        let code = Schema::digits(6);
        assert!(code.parse(&json!("012345")).is_ok());
        assert!(code.parse(&json!("12345a")).is_err());
    }
}
