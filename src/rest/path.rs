// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST path and query builders.

use std::fmt;

use url::form_urlencoded;

/// A path below the REST root (`/rest/v0`), built one segment at a time.
///
/// ```
/// use xo_api_rs::rest::RestPath;
///
/// let path = RestPath::new()
///     .resource("pools")
///     .id("p1")
///     .actions_group()
///     .action("create_vm");
/// assert_eq!(path.to_string(), "/rest/v0/pools/p1/actions/create_vm");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestPath {
    segments: Vec<String>,
}

impl RestPath {
    /// The REST root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `RestPath::new().resource(collection)`.
    #[must_use]
    pub fn collection(collection: &str) -> Self {
        Self::new().resource(collection)
    }

    /// Shorthand for `RestPath::new().resource(collection).id(id)`.
    #[must_use]
    pub fn object(collection: &str, id: impl fmt::Display) -> Self {
        Self::new().resource(collection).id(id)
    }

    /// Append a collection name such as `vms`.
    #[must_use]
    pub fn resource(self, name: &str) -> Self {
        self.segment(name)
    }

    /// Append an object identifier.
    #[must_use]
    pub fn id(self, id: impl fmt::Display) -> Self {
        self.segment(&id.to_string())
    }

    /// Append the literal `actions` namespace.
    #[must_use]
    pub fn actions_group(self) -> Self {
        self.segment("actions")
    }

    /// Append a verb.
    #[must_use]
    pub fn action(self, verb: &str) -> Self {
        self.segment(verb)
    }

    /// Append an arbitrary segment.
    #[must_use]
    pub fn segment(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Escaped path relative to the REST root, e.g. `/vms/abc`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.push_str(&urlencoding::encode(segment));
        }
        out
    }
}

impl fmt::Display for RestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/rest/v0{}", self.render())
    }
}

/// Query parameters, kept in insertion order.
///
/// `limit`, `fields` and `filter` are understood by every collection; any
/// other key is passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
    filters: Vec<String>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of returned items. `0` means no cap.
    #[must_use]
    pub fn limit(self, limit: u32) -> Self {
        if limit == 0 {
            return self;
        }
        self.insert("limit", limit.to_string())
    }

    /// Restrict returned objects to the named fields.
    #[must_use]
    pub fn fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = fields
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if joined.is_empty() {
            return self;
        }
        self.insert("fields", joined)
    }

    /// Add a `name:value` predicate; several predicates form a conjunction.
    #[must_use]
    pub fn filter(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.filters.push(format!("{name}:{value}"));
        self
    }

    /// Add an arbitrary parameter. A repeated key replaces the earlier value in place.
    #[must_use]
    pub fn insert(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
        self
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        if key == "filter" {
            return !self.filters.is_empty();
        }
        self.pairs.iter().any(|(k, _)| k == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.filters.is_empty()
    }

    /// Parameters as key/value pairs, `filter` last.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.pairs.clone();
        if !self.filters.is_empty() {
            pairs.push(("filter".to_string(), self.filters.join(",")));
        }
        pairs
    }

    /// Encoded query string without the leading `?`, or `None` when empty.
    #[must_use]
    pub fn encode(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.pairs() {
            ser.append_pair(&k, &v);
        }
        Some(ser.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_resource_path() {
        let path = RestPath::new()
            .resource("pools")
            .id("u")
            .resource("vms")
            .action("create");
        assert_eq!(path.render(), "/pools/u/vms/create");
        assert_eq!(path.to_string(), "/rest/v0/pools/u/vms/create");
    }

    #[test]
    fn test_actions_group() {
        let path = RestPath::object("tasks", "task-1").actions_group().action("abort");
        assert_eq!(path.to_string(), "/rest/v0/tasks/task-1/actions/abort");
    }

    #[test]
    fn test_segments_are_escaped() {
        let path = RestPath::object("vms", "a b/c");
        assert_eq!(path.render(), "/vms/a%20b%2Fc");
    }

    #[test]
    fn test_empty_params_have_no_query() {
        assert_eq!(Params::new().encode(), None);
        assert_eq!(Params::new().limit(0).fields(Vec::<String>::new()).encode(), None);
    }

    #[test]
    fn test_params_encoding() {
        let params = Params::new()
            .fields(["id", "name_label", "status"])
            .limit(10)
            .filter("status", "pending")
            .filter("name_label", "vm 1");
        assert_eq!(
            params.pairs(),
            vec![
                ("fields".to_string(), "id,name_label,status".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("filter".to_string(), "status:pending,name_label:vm 1".to_string()),
            ]
        );
        assert_eq!(
            params.encode().unwrap(),
            "fields=id%2Cname_label%2Cstatus&limit=10&filter=status%3Apending%2Cname_label%3Avm+1"
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let params = Params::new().insert("a", "1").insert("b", "2").insert("a", "3");
        assert_eq!(
            params.pairs(),
            vec![
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }
}
