//! Route pattern parsing: `{name}` path parameters and segment-boundary
//! prefix matching (spec §4.2).

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    Static(String),
    Param(String),
}

/// A parsed `path` or `pathPrefix` pattern, split on `/` into segments.
#[derive(Debug, Clone)]
pub(crate) struct RoutePattern {
    pub(crate) segments: Vec<PathSegment>,
}

impl RoutePattern {
    pub(crate) fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
                    PathSegment::Param(segment[1..segment.len() - 1].to_string())
                } else {
                    PathSegment::Static(segment.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// `true` if this pattern's segments are an exact prefix of `path`'s
    /// segments (segment-boundary match: `/foo` matches `/foo` and
    /// `/foo/bar` but not `/foobar`). Named params within the prefix are
    /// bound into `vars`, URL-decoded.
    pub(crate) fn matches_prefix(
        &self,
        path_segments: &[&str],
        vars: &mut std::collections::HashMap<String, String>,
    ) -> bool {
        if path_segments.len() < self.segments.len() {
            return false;
        }
        for (pattern_seg, path_seg) in self.segments.iter().zip(path_segments.iter()) {
            match pattern_seg {
                PathSegment::Static(expected) => {
                    if expected != path_seg {
                        return false;
                    }
                }
                PathSegment::Param(name) => {
                    vars.insert(name.clone(), decode_segment(path_seg));
                }
            }
        }
        true
    }

    /// `true` if this pattern matches `path` exactly (same segment count).
    /// Named params are bound into `vars`, URL-decoded.
    pub(crate) fn matches_exact(
        &self,
        path_segments: &[&str],
        vars: &mut std::collections::HashMap<String, String>,
    ) -> bool {
        if path_segments.len() != self.segments.len() {
            return false;
        }
        self.matches_prefix(path_segments, vars)
    }
}

pub(crate) fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_static_and_param_segments() {
        let pattern = RoutePattern::parse("/add_offer/{id}");
        assert_eq!(
            pattern.segments,
            vec![
                PathSegment::Static("add_offer".to_string()),
                PathSegment::Param("id".to_string()),
            ]
        );
    }

    #[test]
    fn prefix_matches_segment_boundary_not_substring() {
        let pattern = RoutePattern::parse("/foo");
        let mut vars = std::collections::HashMap::new();

        assert!(pattern.matches_prefix(&split_segments("/foo"), &mut vars));
        assert!(pattern.matches_prefix(&split_segments("/foo/bar"), &mut vars));
        assert!(!pattern.matches_prefix(&split_segments("/foobar"), &mut vars));
    }

    #[test]
    fn exact_match_binds_decoded_param() {
        let pattern = RoutePattern::parse("/items/{name}");
        let mut vars = std::collections::HashMap::new();
        assert!(pattern.matches_exact(&split_segments("/items/a%2Fb"), &mut vars));
        assert_eq!(vars.get("name"), Some(&"a/b".to_string()));
    }

    #[test]
    fn exact_match_rejects_different_length() {
        let pattern = RoutePattern::parse("/items/{name}");
        let mut vars = std::collections::HashMap::new();
        assert!(!pattern.matches_exact(&split_segments("/items/a/b"), &mut vars));
    }
}
