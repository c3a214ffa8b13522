//! GitLab API client.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::GitLabConfig;
use crate::error::{DeployError, ErrorKind, Result, ResultExt};

/// Client for a GitLab-compatible REST API, authenticated with a private token.
#[derive(Clone)]
pub struct GitLabClient {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) namespace_id: Option<u64>,
    pub(crate) sudo: Option<String>,
    pub(crate) client: Client,
}

impl GitLabClient {
    /// Create a client for `url` (e.g. `https://gitlab.example.com`) using the v4 API.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_api_prefix(url, "/api/v4", token)
    }

    /// Create a client with a custom API prefix.
    pub fn with_api_prefix(
        url: impl Into<String>,
        api_prefix: &str,
        token: impl Into<String>,
    ) -> Self {
        let mut base_url = url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        base_url.push_str(api_prefix.trim_end_matches('/'));
        Self {
            token: token.into(),
            base_url,
            namespace_id: None,
            sudo: None,
            client: Client::new(),
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &GitLabConfig) -> Result<Self> {
        const OP: &str = "gitlab.client";
        if config.url.is_empty() {
            return Err(DeployError::config(OP, "gitlab.url is not set"));
        }
        if config.token.is_empty() {
            return Err(DeployError::config(OP, "gitlab.token is not set"));
        }
        let mut client = Self::with_api_prefix(&config.url, &config.api_prefix, &config.token);
        client.namespace_id = config.namespace_id;
        Ok(client)
    }

    /// Create a client from the `GITLAB_URL` and `GITLAB_TOKEN` environment variables.
    pub fn from_env() -> Result<Self> {
        let config = GitLabConfig {
            url: std::env::var(crate::config::GITLAB_URL_ENV).unwrap_or_default(),
            token: std::env::var(crate::config::GITLAB_TOKEN_ENV).unwrap_or_default(),
            ..GitLabConfig::default()
        };
        Self::from_config(&config)
    }

    /// Namespace that [`create_project`](crate::gitlab::ProjectOps::create_project) uses.
    pub fn with_namespace(mut self, namespace_id: u64) -> Self {
        self.namespace_id = Some(namespace_id);
        self
    }

    /// Act as `username` (requires an admin token).
    pub fn with_sudo(mut self, username: impl Into<String>) -> Self {
        self.sudo = Some(username.into());
        self
    }

    /// Get the default headers for API requests.
    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        const OP: &str = "gitlab.headers";
        let mut headers = HeaderMap::new();
        headers.insert(
            "PRIVATE-TOKEN",
            HeaderValue::from_str(&self.token)
                .map_err(|_| DeployError::invalid_argument(OP, "token is not a valid header value"))?,
        );
        if let Some(sudo) = &self.sudo {
            headers.insert(
                "SUDO",
                HeaderValue::from_str(sudo)
                    .map_err(|_| DeployError::invalid_argument(OP, "sudo user is not a valid header value"))?,
            );
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("gitdeploy"));
        Ok(headers)
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Make a GET request and decode the JSON body.
    pub(crate) fn get<T: serde::de::DeserializeOwned>(
        &self,
        op: &'static str,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.client.get(self.url(endpoint)).query(query);
        self.send(op, request)?.json().at(op)
    }

    /// Make a GET request and return the body as text.
    pub(crate) fn get_text(
        &self,
        op: &'static str,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<String> {
        let request = self.client.get(self.url(endpoint)).query(query);
        self.send(op, request)?.text().at(op)
    }

    /// Make a POST request with a JSON body.
    pub(crate) fn post<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        op: &'static str,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(op, request)?.json().at(op)
    }

    /// Make a PUT request with a JSON body.
    pub(crate) fn put<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        op: &'static str,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.put(self.url(endpoint)).json(body);
        self.send(op, request)?.json().at(op)
    }

    /// Make a DELETE request with a JSON body, ignoring any response body.
    pub(crate) fn delete<B: serde::Serialize>(
        &self,
        op: &'static str,
        endpoint: &str,
        body: &B,
    ) -> Result<()> {
        let request = self.client.delete(self.url(endpoint)).json(body);
        self.send(op, request)?;
        Ok(())
    }

    fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request.headers(self.headers()?).send().at(op)?;
        tracing::debug!(op, status = %response.status(), url = %response.url(), "gitlab response");

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(DeployError::new(
                op,
                ErrorKind::GitLab {
                    status: status.as_u16(),
                    message: body,
                },
            ));
        }
        Ok(response)
    }

    /// Get the base URL including the API prefix.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Encodes a project id or `namespace/name` path for use in a URL.
pub(crate) fn project_segment(project: &str) -> String {
    urlencoding::encode(project).into_owned()
}
