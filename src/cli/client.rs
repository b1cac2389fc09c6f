use anyhow::{anyhow, Context};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Thin HTTP client that unwraps the `{"success": true, "data": ...}` envelope.
pub struct ApiClient {
    base_url: url::Url,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = url::Url::parse(base_url).with_context(|| format!("invalid API URL: {}", base_url))?;
        Ok(Self {
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            http: Client::new(),
        })
    }

    pub fn endpoint(&self, path: &str) -> anyhow::Result<url::Url> {
        self.base_url.join(path).with_context(|| format!("invalid path: {}", path))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        self.send(Method::POST, path, &[], body).await
    }

    /// Raw status and body, for endpoints where a failure status is an answer (health).
    pub async fn get_raw(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    async fn send(&self, method: Method, path: &str, query: &[(&str, String)], body: Option<Value>) -> anyhow::Result<Value> {
        let mut request = self.http.request(method, self.endpoint(path)?).query(query);
        if path.starts_with("/api/") {
            let token = self
                .token
                .as_deref()
                .ok_or_else(|| anyhow!("this command needs a token (--token or HR_API_TOKEN)"))?;
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.context("request failed")?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body: Value = response.json().await.context("response was not JSON")?;
        if status.is_success() {
            Ok(body.get("data").cloned().unwrap_or(body))
        } else {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("request failed");
            Err(anyhow!("{} ({})", message, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_onto_base() {
        let client = ApiClient::new("http://localhost:3000", Some(" ".to_string())).unwrap();
        assert_eq!(client.endpoint("/api/associates").unwrap().as_str(), "http://localhost:3000/api/associates");
        assert!(client.token.is_none());
        assert!(ApiClient::new("not a url", None).is_err());
    }
}
