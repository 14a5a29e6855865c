use serde_json::{Map, Value};

pub type FrontMatter = Map<String, Value>;

/// A markdown document cut into its front-matter block and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    /// YAML between the fences, `None` when the note has no front matter.
    pub yaml: Option<&'a str>,
    /// Everything up to and including the closing fence line.
    pub head: &'a str,
    pub body: &'a str,
}

/// Split YAML front matter from the markdown body. Front matter must open on
/// the very first line; anything else is treated as plain body.
pub fn split(content: &str) -> Split<'_> {
    let plain = Split {
        yaml: None,
        head: "",
        body: content,
    };

    let start = content.strip_prefix('\u{FEFF}').map_or(0, |_| '\u{FEFF}'.len_utf8());
    let rest = &content[start..];
    let after_open = match rest
        .strip_prefix("---\r\n")
        .or_else(|| rest.strip_prefix("---\n"))
    {
        Some(after) => after,
        None => return plain,
    };
    let yaml_start = content.len() - after_open.len();

    // Closing fence may directly follow the opening one
    let (yaml_end, fence_end) = if after_open.starts_with("---") {
        (yaml_start, yaml_start + 3)
    } else {
        match after_open.find("\n---") {
            Some(pos) => (yaml_start + pos + 1, yaml_start + pos + 4),
            None => return plain,
        }
    };

    // Consume the rest of the closing fence line
    let head_end = match content[fence_end..].find('\n') {
        Some(nl) if content[fence_end..fence_end + nl].trim().is_empty() => fence_end + nl + 1,
        None if content[fence_end..].trim().is_empty() => content.len(),
        _ => return plain,
    };

    Split {
        yaml: Some(&content[yaml_start..yaml_end]),
        head: &content[..head_end],
        body: &content[head_end..],
    }
}

/// Parse the front matter of a note into a JSON map. Notes without front
/// matter yield an empty map.
pub fn parse(content: &str) -> Result<FrontMatter, serde_yaml::Error> {
    match split(content).yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str::<FrontMatter>(yaml),
        _ => Ok(FrontMatter::new()),
    }
}

/// Whether the front matter carries `uid` equal to `wanted`, either as a
/// scalar or as one entry of a list. Comparison is exact after coercing
/// scalars to strings.
pub fn has_uid(front_matter: &FrontMatter, wanted: &str) -> bool {
    match front_matter.get("uid") {
        Some(Value::Array(items)) => items.iter().any(|v| scalar_matches(v, wanted)),
        Some(v) => scalar_matches(v, wanted),
        None => false,
    }
}

fn scalar_matches(value: &Value, wanted: &str) -> bool {
    match value {
        Value::String(s) => s == wanted,
        Value::Number(n) => n.to_string() == wanted,
        Value::Bool(b) => b.to_string() == wanted,
        _ => false,
    }
}

/// Content hash used to key the metadata index.
pub fn content_hash(content: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

// Check if a string is effectively empty
fn is_effectively_empty(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_whitespace() || c == '\u{00A0}' || c == '\u{FEFF}')
}

/// Title of a note: its first `# ` heading, else its first non-empty body
/// line, else the file stem.
pub fn extract_title(content: &str, path: &str) -> String {
    for line in split(content).body.lines() {
        let trimmed = line.trim();
        if let Some(title) = trimmed.strip_prefix("# ") {
            let title = title.trim();
            if !is_effectively_empty(title) {
                return title.to_string();
            }
        }
        if !is_effectively_empty(trimmed) {
            return trimmed.chars().take(50).collect();
        }
    }

    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}
