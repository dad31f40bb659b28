// snake_case <-> camelCase conversion for endpoints whose callers use camelCase
// while the upstream API speaks snake_case.

use serde_json::{Map, Value};

pub fn to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for (i, c) in key.chars().enumerate() {
        if c == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    if upper_next {
        out.push('_');
    }
    out
}

pub fn to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Rename object keys recursively; array elements are walked, scalars untouched
pub fn rename_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (rename(&k), rename_keys(v, rename)))
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect()),
        other => other,
    }
}

/// Convert a dotted issue path (`first_name`, `tags.0`) segment by segment
pub fn rename_path(path: &str, rename: fn(&str) -> String) -> String {
    path.split('.').map(rename).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_camel("first_name"), "firstName");
        assert_eq!(to_camel("avatar_url"), "avatarUrl");
        assert_eq!(to_camel("id"), "id");
        assert_eq!(to_camel("_private"), "_private");
        assert_eq!(to_snake("firstName"), "first_name");
        assert_eq!(to_snake("pageSize"), "page_size");
        assert_eq!(to_snake("id"), "id");
    }

    #[test]
    fn test_rename_nested() {
        let upstream = json!({
            "first_name": "Ada",
            "results": [{"comment_count": 2, "author": {"display_name": "Bob"}}],
            "published_at": null
        });
        let camel = rename_keys(upstream.clone(), to_camel);
        assert_eq!(
            camel,
            json!({
                "firstName": "Ada",
                "results": [{"commentCount": 2, "author": {"displayName": "Bob"}}],
                "publishedAt": null
            })
        );
        assert_eq!(rename_keys(camel, to_snake), upstream);
    }

    #[test]
    fn test_rename_path() {
        assert_eq!(rename_path("first_name", to_camel), "firstName");
        assert_eq!(rename_path("tag_list.0", to_camel), "tagList.0");
    }
}
