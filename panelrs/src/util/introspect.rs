//! Child-node extraction from D-Bus introspection documents.
//!
//! Only the names of the direct `<node>` children of the root element are
//! needed to walk an object tree, so this is a small tag scanner rather
//! than a full XML parser.

/// Returns the names of the direct child nodes of an introspection document.
///
/// Children are `<node name="...">` elements nested exactly one level below
/// the root `<node>`. Interfaces, annotations, comments and the prolog are
/// skipped. An empty or malformed document yields no children.
pub(crate) fn child_nodes(xml: &str) -> Vec<String> {
    let mut children = Vec::new();
    let mut depth = 0usize;
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        rest = &rest[start..];

        if let Some(after) = rest.strip_prefix("<!--") {
            match after.find("-->") {
                Some(end) => {
                    rest = &after[end + 3..];
                    continue;
                }
                None => return Vec::new(),
            }
        }

        let Some(end) = rest.find('>') else {
            return Vec::new();
        };
        let tag = &rest[1..end];
        rest = &rest[end + 1..];

        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }

        if let Some(closing) = tag.strip_prefix('/') {
            if tag_name(closing) == "node" {
                let Some(d) = depth.checked_sub(1) else {
                    return Vec::new();
                };
                depth = d;
            }
            continue;
        }

        if tag_name(tag) != "node" {
            continue;
        }

        if depth == 1 {
            if let Some(name) = attribute(tag, "name") {
                if !name.is_empty() {
                    children.push(name.to_string());
                }
            }
        }

        if !tag.trim_end().ends_with('/') {
            depth += 1;
        }
    }

    if depth != 0 {
        return Vec::new();
    }
    children
}

/// Joins a parent object path and a child node name.
pub(crate) fn child_path(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child)
}

/// Returns the parent of an object path, `None` for the root or a bare name.
pub(crate) fn parent_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

fn tag_name(tag: &str) -> &str {
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(tag.len());
    &tag[..end]
}

fn attribute<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let mut search = tag;
    while let Some(pos) = search.find(key) {
        let preceded_by_space = search[..pos]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let after = search[pos + key.len()..].trim_start();
        search = &search[pos + key.len()..];

        if !preceded_by_space {
            continue;
        }
        let Some(value) = after.strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let quote = value.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value = &value[1..];
        let close = value.find(quote)?;
        return Some(&value[..close]);
    }
    None
}
