//! Resource path templates
//!
//! Templates are written either in API Gateway brace syntax (`/users/{id}`) or in
//! colon syntax (`/users/:id`). A trailing `{proxy+}` (or `:proxy+`) captures the
//! rest of the path. Matching is segment for segment with no trailing-slash or case
//! normalization.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Greedy(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        let name = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .or_else(|| raw.strip_prefix(':'))
            .filter(|name| !name.is_empty() && *name != "+");

        match name {
            Some(name) => match name.strip_suffix('+') {
                Some(greedy) => Self::Greedy(greedy.to_string()),
                None => Self::Param(name.to_string()),
            },
            None => Self::Literal(raw.to_string()),
        }
    }
}

/// Compiled resource template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        Self {
            segments: template.split('/').map(Segment::parse).collect(),
        }
    }

    /// Template rendered in API Gateway brace syntax
    pub fn to_resource_path(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(s) => s.clone(),
                Segment::Param(name) => format!("{{{name}}}"),
                Segment::Greedy(name) => format!("{{{name}+}}"),
            })
            .collect();
        parts.join("/")
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) | Segment::Greedy(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_params(&self) -> bool {
        self.param_names().next().is_some()
    }

    /// Structural match; returns the percent-decoded captures
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').collect();
        let mut params = HashMap::new();

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if parts.get(idx) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(idx).filter(|v| !v.is_empty())?;
                    params.insert(name.clone(), decode(value));
                }
                Segment::Greedy(name) => {
                    // only meaningful as the final segment
                    if idx + 1 != self.segments.len() || idx >= parts.len() {
                        return None;
                    }
                    let rest = parts[idx..].join("/");
                    if rest.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), decode(&rest));
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_resource_path())
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_colon_and_brace_syntax_are_equivalent() {
        let colon = PathTemplate::parse("/users/:id/orders/:orderId");
        let brace = PathTemplate::parse("/users/{id}/orders/{orderId}");
        assert_eq!(colon, brace);
        assert_eq!(colon.to_resource_path(), "/users/{id}/orders/{orderId}");

        assert_eq!(
            colon.matches("/users/42/orders/7"),
            Some(params(&[("id", "42"), ("orderId", "7")]))
        );
    }

    #[test]
    fn test_literal_template() {
        let template = PathTemplate::parse("/health");
        assert!(!template.has_params());
        assert_eq!(template.matches("/health"), Some(HashMap::new()));
        assert_eq!(template.matches("/Health"), None);
        assert_eq!(template.matches("/health/"), None);
        assert_eq!(template.matches("/health/x"), None);
    }

    #[test]
    fn test_root_template() {
        let template = PathTemplate::parse("/");
        assert_eq!(template.matches("/"), Some(HashMap::new()));
        assert_eq!(template.matches("/a"), None);
    }

    #[test]
    fn test_param_captures_one_segment() {
        let template = PathTemplate::parse("/users/{id}");
        assert_eq!(template.matches("/users/"), None);
        assert_eq!(template.matches("/users/1/2"), None);
        assert_eq!(
            template.matches("/users/john%20doe"),
            Some(params(&[("id", "john doe")]))
        );
    }

    #[test]
    fn test_greedy_proxy() {
        let template = PathTemplate::parse("/files/{proxy+}");
        assert_eq!(template.to_resource_path(), "/files/{proxy+}");
        assert_eq!(
            template.matches("/files/a/b/c.txt"),
            Some(params(&[("proxy", "a/b/c.txt")]))
        );
        assert_eq!(template.matches("/files/x"), Some(params(&[("proxy", "x")])));
        assert_eq!(template.matches("/files"), None);
        assert_eq!(template.matches("/files/"), None);

        let colon = PathTemplate::parse("/:proxy+");
        assert_eq!(colon.to_resource_path(), "/{proxy+}");
        assert_eq!(colon.matches("/any/thing"), Some(params(&[("proxy", "any/thing")])));
    }

    #[test]
    fn test_param_names() {
        let template = PathTemplate::parse("/a/{x}/b/:y");
        assert_eq!(template.param_names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(template.to_string(), "/a/{x}/b/{y}");
    }
}
