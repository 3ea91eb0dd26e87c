//! URI templates and the scoped URI families of the MQM REST API.
//!
//! Templates are relative paths with `{name}` placeholders, e.g.
//! `test/{0}?id={1}`. Parameter values are percent-encoded before they are
//! substituted (space becomes `%20`, braces are escaped), so a value can never
//! introduce a new placeholder. Characters in the template itself that need
//! encoding must already be encoded.
//!
//! A placeholder with no matching parameter is a caller error and fails with
//! [`Error::IllegalArgument`](crate::Error::IllegalArgument) rather than being
//! sent to the server verbatim.

use crate::{Error, Result};
use url::Url;

const API_URI: &str = "api/shared_spaces/{0}";
const INTERNAL_API_URI: &str = "internal-api/shared_spaces/{0}";
const WORKSPACE_API_URI: &str = "api/shared_spaces/{0}/workspaces/{1}";
const WORKSPACE_INTERNAL_API_URI: &str = "internal-api/shared_spaces/{0}/workspaces/{1}";

/// Named or positional template parameters.
///
/// # Examples
///
/// ```
/// use mqm_rest::uri::{resolve_template, Params};
///
/// let positional = Params::positional(["J Unit", "123"]);
/// assert_eq!(
///     resolve_template("test/{0}?id={1}", &positional).unwrap(),
///     "test/J%20Unit?id=123"
/// );
///
/// let named = Params::new().with("name", "a&b");
/// assert_eq!(resolve_template("q?n={name}", &named).unwrap(), "q?n=a%26b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates parameters named `0`, `1`, ... in iteration order.
    pub fn positional<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        Self {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Adds a named parameter, replacing an earlier one with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Percent-encodes a single template parameter.
pub fn encode_param(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Resolves every placeholder in `template`.
///
/// # Errors
///
/// Returns [`Error::IllegalArgument`] naming the first placeholder that has
/// no parameter.
pub fn resolve_template(template: &str, params: &Params) -> Result<String> {
    let mut result = template.to_string();
    for (name, value) in &params.entries {
        result = result.replace(&format!("{{{}}}", name), &encode_param(value));
    }

    match find_placeholder(&result) {
        Some(placeholder) => Err(Error::IllegalArgument(format!(
            "Unresolved placeholder '{}' in URI template '{}'",
            placeholder, template
        ))),
        None => Ok(result),
    }
}

/// Finds the first `{identifier}` token.
fn find_placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        let candidate = &rest[start..];
        if let Some(end) = candidate.find('}') {
            let name = &candidate[1..end];
            if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Some(&candidate[..=end]);
            }
        }
        rest = &candidate[1..];
    }
    None
}

/// A collection request: which entities, which page, which fields.
///
/// # Examples
///
/// ```
/// use mqm_rest::uri::EntityQuery;
/// use mqm_rest::query::condition;
///
/// let query = EntityQuery::new("taxonomy_nodes")
///     .workspace(1002)
///     .condition(condition("name", "Chrome"))
///     .fields(["id", "name"])
///     .page(0, 100)
///     .order_by("id");
/// assert_eq!(query.offset(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    collection: String,
    workspace_id: Option<u64>,
    conditions: Vec<String>,
    fields: Vec<String>,
    paging: Option<(u32, u32)>,
    order_by: Option<String>,
}

impl EntityQuery {
    /// Starts a query over `collection`, relative to the shared space.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Scopes the query to a workspace.
    pub fn workspace(mut self, workspace_id: u64) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Adds a filter condition; conditions are ANDed.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds several filter conditions.
    pub fn conditions<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.conditions.extend(conditions.into_iter().map(Into::into));
        self
    }

    /// Restricts the returned fields.
    pub fn fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Requests one page.
    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.paging = Some((offset, limit));
        self
    }

    /// Orders by a field; an empty name means no ordering.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into()).filter(|f: &String| !f.is_empty());
        self
    }

    /// The requested offset, `0` when no page was requested.
    pub fn offset(&self) -> u32 {
        self.paging.map(|(offset, _)| offset).unwrap_or(0)
    }
}

/// Builds absolute URIs from a server location and shared space.
#[derive(Debug, Clone)]
pub struct UriBuilder {
    location: String,
    shared_space: String,
}

impl UriBuilder {
    /// Creates a builder; a trailing slash on `location` is ignored.
    pub fn new(location: impl Into<String>, shared_space: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            location: location.trim_end_matches('/').to_string(),
            shared_space: shared_space.into(),
        }
    }

    /// `{location}/{template}`
    pub fn base_uri(&self, template: &str, params: &Params) -> Result<Url> {
        let path = resolve_template(template, params)?;
        Ok(Url::parse(&format!("{}/{}", self.location, path))?)
    }

    /// `{location}/api/shared_spaces/{shared_space}/{template}`
    pub fn shared_space_api_uri(&self, template: &str, params: &Params) -> Result<Url> {
        self.scoped(API_URI, Params::positional([&self.shared_space]), template, params)
    }

    /// `{location}/internal-api/shared_spaces/{shared_space}/{template}`
    pub fn shared_space_internal_api_uri(&self, template: &str, params: &Params) -> Result<Url> {
        self.scoped(
            INTERNAL_API_URI,
            Params::positional([&self.shared_space]),
            template,
            params,
        )
    }

    /// Same family as [`shared_space_api_uri`](Self::shared_space_api_uri).
    pub fn project_api_uri(&self, template: &str, params: &Params) -> Result<Url> {
        self.shared_space_api_uri(template, params)
    }

    /// `{location}/api/shared_spaces/{shared_space}/workspaces/{workspace_id}/{template}`
    pub fn workspace_api_uri(&self, template: &str, workspace_id: u64, params: &Params) -> Result<Url> {
        self.scoped(
            WORKSPACE_API_URI,
            Params::positional([self.shared_space.clone(), workspace_id.to_string()]),
            template,
            params,
        )
    }

    /// `{location}/internal-api/shared_spaces/{shared_space}/workspaces/{workspace_id}/{template}`
    pub fn workspace_internal_api_uri(
        &self,
        template: &str,
        workspace_id: u64,
        params: &Params,
    ) -> Result<Url> {
        self.scoped(
            WORKSPACE_INTERNAL_API_URI,
            Params::positional([self.shared_space.clone(), workspace_id.to_string()]),
            template,
            params,
        )
    }

    /// Builds the URI of a collection request.
    ///
    /// Fragments appear only when set, always in the order paging, query,
    /// fields, ordering. The filter expression is the conditions joined with
    /// `;` and wrapped in double quotes.
    ///
    /// ```
    /// use mqm_rest::uri::{EntityQuery, UriBuilder};
    ///
    /// let uris = UriBuilder::new("http://mqm", "1001");
    /// let uri = uris
    ///     .entity_uri(&EntityQuery::new("releases").page(0, 10).condition("id=5"))
    ///     .unwrap();
    /// assert_eq!(
    ///     uri.as_str(),
    ///     "http://mqm/api/shared_spaces/1001/releases?offset=0&limit=10&query=%22id%3D5%22"
    /// );
    /// ```
    pub fn entity_uri(&self, query: &EntityQuery) -> Result<Url> {
        let mut params = Params::new();
        let mut fragments = Vec::new();

        if let Some((offset, limit)) = query.paging {
            params = params.with("offset", offset).with("limit", limit);
            fragments.push("offset={offset}&limit={limit}");
        }
        if !query.conditions.is_empty() {
            params = params.with("query", format!("\"{}\"", query.conditions.join(";")));
            fragments.push("query={query}");
        }
        if !query.fields.is_empty() {
            params = params.with("fields", query.fields.join(","));
            fragments.push("fields={fields}");
        }
        if let Some(order) = &query.order_by {
            params = params.with("order", order);
            fragments.push("order_by={order}");
        }

        let template = if fragments.is_empty() {
            query.collection.clone()
        } else {
            format!("{}?{}", query.collection, fragments.join("&"))
        };

        match query.workspace_id {
            Some(workspace_id) => self.workspace_api_uri(&template, workspace_id, &params),
            None => self.shared_space_api_uri(&template, &params),
        }
    }

    fn scoped(&self, prefix: &str, scope: Params, template: &str, params: &Params) -> Result<Url> {
        let prefix = resolve_template(prefix, &scope)?;
        let path = resolve_template(template, params)?;
        Ok(Url::parse(&format!("{}/{}/{}", self.location, prefix, path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uris() -> UriBuilder {
        UriBuilder::new("http://localhost:8080/", "1001")
    }

    #[test]
    fn test_spaces_encode_as_percent_20() {
        let resolved = resolve_template("a/{0}", &Params::positional(["J Unit test"])).unwrap();
        assert_eq!(resolved, "a/J%20Unit%20test");
        assert!(!resolved.contains('+'));
    }

    #[test]
    fn test_braces_in_values_cannot_form_placeholders() {
        let params = Params::positional(["{1}", "x"]);
        let resolved = resolve_template("a/{0}/{1}", &params).unwrap();
        assert_eq!(resolved, "a/%7B1%7D/x");
    }

    #[test]
    fn test_unresolved_placeholder_fails() {
        let err = resolve_template("a/{0}/{missing}", &Params::positional(["x"])).unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(m) if m.contains("{missing}")));
    }

    #[test]
    fn test_named_params_override() {
        let params = Params::new().with("id", 1).with("id", 2);
        assert_eq!(resolve_template("e/{id}", &params).unwrap(), "e/2");
    }

    #[test]
    fn test_scoped_families() {
        let uris = uris();
        let none = Params::new();

        assert_eq!(
            uris.base_uri("authentication/sign_in", &none).unwrap().as_str(),
            "http://localhost:8080/authentication/sign_in"
        );
        assert_eq!(
            uris.shared_space_api_uri("workspaces", &none).unwrap().as_str(),
            "http://localhost:8080/api/shared_spaces/1001/workspaces"
        );
        assert_eq!(
            uris.shared_space_internal_api_uri("analytics/ci/servers/connectivity/status", &none)
                .unwrap()
                .as_str(),
            "http://localhost:8080/internal-api/shared_spaces/1001/analytics/ci/servers/connectivity/status"
        );
        assert_eq!(
            uris.workspace_api_uri("releases/{0}", 1002, &Params::positional([7]))
                .unwrap()
                .as_str(),
            "http://localhost:8080/api/shared_spaces/1001/workspaces/1002/releases/7"
        );
        assert_eq!(
            uris.workspace_internal_api_uri("jobs", 1002, &none).unwrap().as_str(),
            "http://localhost:8080/internal-api/shared_spaces/1001/workspaces/1002/jobs"
        );
        assert_eq!(
            uris.project_api_uri("x", &none).unwrap(),
            uris.shared_space_api_uri("x", &none).unwrap()
        );
    }

    #[test]
    fn test_entity_uri_fragment_order() {
        let query = EntityQuery::new("taxonomy_nodes")
            .workspace(1002)
            .order_by("name")
            .fields(["id", "name"])
            .conditions(["name='Chrome'", "id=3"])
            .page(20, 10);

        let uri = uris().entity_uri(&query).unwrap();
        assert_eq!(
            uri.as_str(),
            "http://localhost:8080/api/shared_spaces/1001/workspaces/1002/taxonomy_nodes\
             ?offset=20&limit=10\
             &query=%22name%3D%27Chrome%27%3Bid%3D3%22\
             &fields=id%2Cname\
             &order_by=name"
        );
    }

    #[test]
    fn test_entity_uri_without_fragments() {
        let uri = uris()
            .entity_uri(&EntityQuery::new("workspaces").order_by(""))
            .unwrap();
        assert_eq!(uri.as_str(), "http://localhost:8080/api/shared_spaces/1001/workspaces");
    }
}
