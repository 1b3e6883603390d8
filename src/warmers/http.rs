//! # HttpWarmer
//!
//! Warms remote endpoints by calling every configured URL once per iteration.
//!
//! ## Parameters
//! | key       | type               | required | default |
//! |-----------|--------------------|----------|---------|
//! | `urls`    | array of strings   | yes      |         |
//! | `method`  | `get`/`post`/`put`/`head` | no | `get`   |
//! | `body`    | string             | no       | none    |
//! | `headers` | table of strings   | no       | empty   |
//!
//! A transport error on any URL fails the iteration; HTTP status codes are
//! only logged.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::TaskError, policies::Params, warmers::Warmer};

/// Issues one request per configured URL on every `next`.
#[derive(Debug)]
pub struct HttpWarmer {
    client: Client,
    urls: Vec<String>,
    method: Method,
    body: Option<String>,
    headers: BTreeMap<String, String>,
}

impl HttpWarmer {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            urls: Vec::new(),
            method: Method::GET,
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Default for HttpWarmer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_method(raw: &str) -> Result<Method, TaskError> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "HEAD" => Ok(Method::HEAD),
        other => Err(TaskError::fail(format!("unsupported http method '{other}'"))),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Warmer for HttpWarmer {
    async fn init(&mut self, params: &Params) -> Result<(), TaskError> {
        let urls = match params.get("urls") {
            Some(Value::Array(items)) => items.iter().map(as_text).collect(),
            Some(_) => return Err(TaskError::fail("'urls' parameter must be an array")),
            None => return Err(TaskError::fail("missing 'urls' parameter")),
        };
        let method = match params.get("method") {
            Some(v) => parse_method(&as_text(v))?,
            None => Method::GET,
        };
        let headers = match params.get("headers") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), as_text(v))).collect(),
            Some(_) => return Err(TaskError::fail("'headers' parameter must be a table")),
            None => BTreeMap::new(),
        };

        self.urls = urls;
        self.method = method;
        self.body = params.get("body").map(as_text);
        self.headers = headers;
        Ok(())
    }

    async fn next(&mut self) -> Result<(), TaskError> {
        for url in &self.urls {
            debug!(method = %self.method, %url, "calling url");
            let mut request = self.client.request(self.method.clone(), url);
            if let Some(body) = self.body.as_ref().filter(|b| !b.is_empty()) {
                request = request.body(body.clone());
            }
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) => {
                    debug!(status = %response.status(), %url, "got response");
                }
                Err(e) => {
                    warn!(%url, error = %e, "failed to call url");
                    return Err(TaskError::fail(e));
                }
            }
        }
        Ok(())
    }
}
