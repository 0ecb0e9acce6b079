//! HTTP transport to the Vault API.

use super::backend::StoreError;
use serde_json::Value;
use url::Url;

/// Path used to verify the token once per session
pub const TOKEN_LOOKUP_PATH: &str = "auth/token/lookup-self";

/// Trait for Vault API calls, allowing for mocking in tests.
///
/// Paths are relative to `/v1/`. A 4xx other than 404 is `Denied` and concerns
/// only the requested path; failing to reach Vault or a 5xx is `Transport`.
pub trait VaultTransport: Send + Sync {
    /// GET a path. Returns `Ok(None)` when Vault answers 404.
    fn get(&self, api_path: &str) -> Result<Option<Value>, StoreError>;

    /// POST a JSON body to a path
    fn post(&self, api_path: &str, body: &Value) -> Result<(), StoreError>;
}

/// Real transport using reqwest's blocking client
pub struct ReqwestTransport {
    base: Url,
    token: String,
    namespace: Option<String>,
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a transport from the Vault address and token.
    ///
    /// Both must be present; nothing is sent over the wire yet.
    pub fn new(
        address: Option<&str>,
        token: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Self, StoreError> {
        let address = address.filter(|a| !a.trim().is_empty()).ok_or_else(|| {
            StoreError::Configuration("VAULT_ADDR is not set".to_string())
        })?;
        let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            StoreError::Configuration("VAULT_TOKEN is not set".to_string())
        })?;

        let mut base = Url::parse(address).map_err(|e| {
            StoreError::Configuration(format!("invalid VAULT_ADDR '{}': {}", address, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base.join("v1/").map_err(|e| {
            StoreError::Configuration(format!("invalid VAULT_ADDR '{}': {}", address, e))
        })?;

        Ok(Self {
            base,
            token: token.to_string(),
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            client: reqwest::blocking::Client::new(),
        })
    }

    /// Full URL for an API path
    pub fn url(&self, api_path: &str) -> Result<Url, StoreError> {
        self.base
            .join(api_path.trim_start_matches('/'))
            .map_err(|e| StoreError::Configuration(format!("invalid path '{}': {}", api_path, e)))
    }

    fn request(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        let builder = builder.header("X-Vault-Token", &self.token);
        match &self.namespace {
            Some(namespace) => builder.header("X-Vault-Namespace", namespace),
            None => builder,
        }
    }
}

/// Error for a non-success status other than 404
fn status_error(method: &str, url: &Url, status: reqwest::StatusCode, body: &str) -> StoreError {
    let message = format!("{} {} returned {}: {}", method, url, status, body.trim());
    if status.is_client_error() {
        StoreError::Denied(message)
    } else {
        StoreError::Transport(message)
    }
}

impl VaultTransport for ReqwestTransport {
    fn get(&self, api_path: &str) -> Result<Option<Value>, StoreError> {
        let url = self.url(api_path)?;
        let response = self
            .request(self.client.get(url.clone()))
            .send()
            .map_err(|e| StoreError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().map_err(|e| {
            StoreError::Transport(format!("Failed to read response from {}: {}", url, e))
        })?;

        if !status.is_success() {
            return Err(status_error("GET", &url, status, &body));
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Transport(format!("Invalid JSON from {}: {}", url, e)))
    }

    fn post(&self, api_path: &str, body: &Value) -> Result<(), StoreError> {
        let url = self.url(api_path)?;
        let response = self
            .request(self.client.post(url.clone()))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| StoreError::Transport(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(status_error("POST", &url, status, &text));
        }

        Ok(())
    }
}

/// In-memory Vault emulating the KV v1 and v2 HTTP shapes, for testing
#[cfg(test)]
pub struct MemoryTransport {
    engine: super::KvVersion,
    records: std::sync::Mutex<std::collections::BTreeMap<String, serde_json::Map<String, Value>>>,
    requests: std::sync::Mutex<Vec<String>>,
    denied: std::sync::Mutex<Vec<String>>,
    unreachable: bool,
}

#[cfg(test)]
impl MemoryTransport {
    pub fn new(engine: super::KvVersion) -> Self {
        Self {
            engine,
            records: std::sync::Mutex::new(std::collections::BTreeMap::new()),
            requests: std::sync::Mutex::new(Vec::new()),
            denied: std::sync::Mutex::new(Vec::new()),
            unreachable: false,
        }
    }

    /// A transport whose every call fails as if Vault were down
    pub fn unreachable(engine: super::KvVersion) -> Self {
        Self {
            unreachable: true,
            ..Self::new(engine)
        }
    }

    /// Answer 403 for an API path, as a token without access would get
    pub fn deny(&self, api_path: &str) {
        self.denied.lock().unwrap().push(api_path.to_string());
    }

    fn check_access(&self, api_path: &str) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        if self.denied.lock().unwrap().iter().any(|p| p == api_path) {
            return Err(StoreError::Denied(format!("{} returned 403 Forbidden", api_path)));
        }
        Ok(())
    }

    fn api_path(&self, mount: &str, path: &str) -> String {
        match self.engine {
            super::KvVersion::V1 => format!("{}/{}", mount, path),
            super::KvVersion::V2 => format!("{}/data/{}", mount, path),
        }
    }

    /// Store a record directly, bypassing the backends
    pub fn seed(&self, mount: &str, path: &str, fields: Value) {
        let record = fields.as_object().cloned().unwrap_or_default();
        let key = self.api_path(mount, path);
        self.records.lock().unwrap().insert(key, record);
    }

    /// Current content of a record
    pub fn record(&self, mount: &str, path: &str) -> Option<serde_json::Map<String, Value>> {
        let key = self.api_path(mount, path);
        self.records.lock().unwrap().get(&key).cloned()
    }

    /// Requests seen so far, as `METHOD path`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl VaultTransport for MemoryTransport {
    fn get(&self, api_path: &str) -> Result<Option<Value>, StoreError> {
        self.requests.lock().unwrap().push(format!("GET {}", api_path));
        self.check_access(api_path)?;

        if api_path == TOKEN_LOOKUP_PATH {
            return Ok(Some(serde_json::json!({"data": {"policies": ["root"]}})));
        }

        let records = self.records.lock().unwrap();
        Ok(records.get(api_path).map(|record| match self.engine {
            super::KvVersion::V1 => serde_json::json!({ "data": record }),
            super::KvVersion::V2 => serde_json::json!({
                "data": { "data": record, "metadata": { "version": 1 } }
            }),
        }))
    }

    fn post(&self, api_path: &str, body: &Value) -> Result<(), StoreError> {
        self.requests.lock().unwrap().push(format!("POST {}", api_path));
        self.check_access(api_path)?;

        let fields = match self.engine {
            super::KvVersion::V1 => body.as_object().cloned(),
            super::KvVersion::V2 => body.get("data").and_then(|d| d.as_object()).cloned(),
        }
        .ok_or_else(|| StoreError::Transport(format!("malformed body for {}", api_path)))?;

        self.records
            .lock()
            .unwrap()
            .insert(api_path.to_string(), fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn transport_for(server: &MockServer) -> ReqwestTransport {
        ReqwestTransport::new(Some(server.base_url().as_str()), Some("root"), Some("team-a"))
            .unwrap()
    }

    #[test]
    fn test_missing_address_is_configuration_error() {
        let result = ReqwestTransport::new(None, Some("token"), None);
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let result = ReqwestTransport::new(Some("http://127.0.0.1:8200"), Some(""), None);
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn test_invalid_address_is_configuration_error() {
        let result = ReqwestTransport::new(Some("not a url"), Some("token"), None);
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn test_url_building() {
        let transport =
            ReqwestTransport::new(Some("http://127.0.0.1:8200"), Some("token"), None).unwrap();
        assert_eq!(
            transport.url("secret/data/hello").unwrap().as_str(),
            "http://127.0.0.1:8200/v1/secret/data/hello"
        );

        let prefixed =
            ReqwestTransport::new(Some("https://vault.example.com/proxy"), Some("t"), None)
                .unwrap();
        assert_eq!(
            prefixed.url("/secret/hello").unwrap().as_str(),
            "https://vault.example.com/proxy/v1/secret/hello"
        );
    }

    #[test]
    fn test_get_sends_token_and_namespace() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/v1/secret/data/hello")
                .header("x-vault-token", "root")
                .header("x-vault-namespace", "team-a");
            then.status(200)
                .json_body(json!({"data": {"data": {"value": "testsecret"}}}));
        });

        let body = transport_for(&server).get("secret/data/hello").unwrap();

        m.assert();
        assert_eq!(body, Some(json!({"data": {"data": {"value": "testsecret"}}})));
    }

    #[test]
    fn test_get_not_found_is_none() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/v1/secret/data/absent");
            then.status(404).json_body(json!({"errors": []}));
        });

        assert_eq!(transport_for(&server).get("secret/data/absent").unwrap(), None);
    }

    #[test]
    fn test_forbidden_is_denied() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/v1/secret/data/locked");
            then.status(403)
                .json_body(json!({"errors": ["1 error occurred:\n\t* permission denied\n\n"]}));
        });
        let _post = server.mock(|when, then| {
            when.method(Method::POST).path("/v1/secret/data/locked");
            then.status(403).body("permission denied");
        });

        let transport = transport_for(&server);

        match transport.get("secret/data/locked") {
            Err(StoreError::Denied(msg)) => assert!(msg.contains("403"), "{}", msg),
            other => panic!("expected denied, got {:?}", other),
        }
        assert!(matches!(
            transport.post("secret/data/locked", &json!({"data": {}})),
            Err(StoreError::Denied(_))
        ));
    }

    #[test]
    fn test_server_error_is_transport() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/v1/secret/data/hello");
            then.status(503).body("Vault is sealed");
        });

        match transport_for(&server).get("secret/data/hello") {
            Err(StoreError::Transport(msg)) => assert!(msg.contains("sealed"), "{}", msg),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_transport() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/v1/secret/data/hello");
            then.status(200).body("<html>proxy login</html>");
        });

        assert!(matches!(
            transport_for(&server).get("secret/data/hello"),
            Err(StoreError::Transport(_))
        ));
    }

    #[test]
    fn test_post_sends_json_body() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/v1/secret/data/app")
                .header("x-vault-token", "root")
                .json_body(json!({"data": {"password": "hunter2"}}));
            then.status(204);
        });

        transport_for(&server)
            .post("secret/data/app", &json!({"data": {"password": "hunter2"}}))
            .unwrap();

        m.assert();
    }

    #[test]
    fn test_unreachable_server_is_transport() {
        // Nothing listens on port 1
        let transport =
            ReqwestTransport::new(Some("http://127.0.0.1:1"), Some("root"), None).unwrap();
        assert!(matches!(
            transport.get("secret/data/hello"),
            Err(StoreError::Transport(_))
        ));
    }
}
