//! Endpoint resolution
//!
//! Turns a logical operation name plus named parameters into a request
//! target. Templates come from the `[api.endpoints]` config table; names are
//! matched case-insensitively and the first definition of a name wins. When
//! the configured table is empty the built-in table below is installed.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::common::{Error, Result};

/// Logical names of the operations this crate issues itself
pub mod keys {
    pub const TEST_PLAN: &str = "TestPlan";
    pub const EXECUTE_CODE: &str = "ExecuteCode";
    pub const EXECUTE_WS: &str = "ExecuteWs";
}

/// Parameter names used in the built-in templates
pub mod params {
    pub const TEST_CASE_ID: &str = "testCaseId";
    pub const SCRIPT_TYPE: &str = "script_type";
}

/// Built-in endpoint table used when nothing is configured
static DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    ("GetTestSteps", "testcases/{testCaseId}/steps"),
    ("GetTestCases", "projects/{projectId}/testcases"),
    ("GetProjects", "my-projects"),
    ("CreateProject", "project/"),
    ("Login", "login/"),
    ("TestPlan", "testplan/{testCaseId}"),
    ("ExecuteCode", "execute-code?script_type={script_type}"),
    ("ExecutionLogs", "execution"),
    (
        "ExecuteWs",
        "testcases/{testCaseId}/execute-ws?script_type={script_type}",
    ),
];

/// Everything except RFC 3986 unreserved characters gets encoded
const DATA: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Immutable logical-name -> template table
#[derive(Debug, Clone)]
pub struct EndpointTable {
    /// (lowercased name, template) in first-definition order
    entries: Vec<(String, String)>,
}

impl EndpointTable {
    /// Build the table from configured entries
    ///
    /// Names are folded to lowercase; a later entry whose name collides with
    /// an earlier one is ignored. An empty input installs the defaults.
    pub fn new<I, K, V>(configured: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (name, template) in configured {
            let name = name.as_ref().to_lowercase();
            if entries.iter().any(|(existing, _)| *existing == name) {
                tracing::debug!(endpoint = %name, "Ignoring duplicate endpoint definition");
                continue;
            }
            entries.push((name, template.into()));
        }

        if entries.is_empty() {
            return Self::defaults();
        }

        Self { entries }
    }

    /// The built-in table
    pub fn defaults() -> Self {
        Self {
            entries: DEFAULT_ENDPOINTS
                .iter()
                .map(|(name, template)| (name.to_lowercase(), template.to_string()))
                .collect(),
        }
    }

    /// Look up the template registered for `key`
    pub fn template(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, template)| template.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Resolves endpoint keys against an [`EndpointTable`] and a base URL
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    table: EndpointTable,
    base_url: Url,
}

impl EndpointResolver {
    pub fn new(table: EndpointTable, base_url: &str) -> Result<Self> {
        Ok(Self {
            table,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn table(&self) -> &EndpointTable {
        &self.table
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a key (or literal template) into a relative request target
    ///
    /// Unregistered keys are used as the template itself. Every `{name}` is
    /// replaced with the percent-encoded value; placeholders without a
    /// matching parameter are left as they are.
    pub fn resolve(&self, key: &str, params: &[(&str, &str)]) -> String {
        let mut target = self.table.template(key).unwrap_or(key).to_string();
        for (name, value) in params {
            let placeholder = format!("{{{name}}}");
            if target.contains(&placeholder) {
                let encoded = utf8_percent_encode(value, DATA).to_string();
                target = target.replace(&placeholder, &encoded);
            }
        }
        target
    }

    /// Resolve a key into an absolute HTTP URL
    pub fn http_url(&self, key: &str, params: &[(&str, &str)]) -> Result<Url> {
        let target = self.resolve(key, params);
        self.base_url
            .join(&target)
            .map_err(|e| Error::invalid_url(&target, e))
    }

    /// Resolve a key into an absolute WebSocket URL (`http`→`ws`, `https`→`wss`)
    pub fn ws_url(&self, key: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.http_url(key, params)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::invalid_url(url.as_str(), format!("cannot use scheme {scheme}")))?;
        Ok(url)
    }
}

/// Parse the base URL, making sure relative targets join under its path
fn parse_base_url(base: &str) -> Result<Url> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let url = Url::parse(&normalized).map_err(|e| Error::invalid_url(base, e))?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(Error::invalid_url(base, format!("unsupported scheme '{other}'"))),
    }
}
