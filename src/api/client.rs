use crate::api::error::FetchError;
use crate::config::ApiConfig;
use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Something that can perform a JSON request against the upstream API.
///
/// The response cache only talks to this trait, so tests can script
/// responses without a server.
pub trait Transport: Send + Sync + 'static {
  /// Send `method path` with an optional JSON body and decode the JSON response.
  fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> BoxFuture<'static, Result<Value, FetchError>>;
}

/// reqwest-backed transport bound to a fixed base URL.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("pkfin/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }
}

impl Transport for HttpTransport {
  fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> BoxFuture<'static, Result<Value, FetchError>> {
    let client = self.client.clone();
    let url = self.base_url.join(path);
    let path = path.to_string();

    async move {
      let url = url.map_err(|e| FetchError::Network(format!("invalid path {}: {}", path, e)))?;
      debug!(%method, %url, "sending upstream request");

      let mut request = client.request(method, url);
      if let Some(body) = body {
        request = request.json(&body);
      }

      let response = request.send().await?;
      let status = response.status();
      if !status.is_success() {
        // Error bodies are not guaranteed to be JSON, only the status matters.
        return Err(FetchError::Http {
          status: status.as_u16(),
        });
      }

      let value = response.json::<Value>().await?;
      Ok(value)
    }
    .boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::task::JoinHandle;

  /// Answer one connection with `status`/`body` and hand back the raw request.
  async fn serve_once(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let reply = format!(
      "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
      status,
      content_type,
      body.len(),
      body
    );

    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut request = Vec::new();
      let mut buf = [0u8; 4096];
      loop {
        let n = socket.read(&mut buf).await.unwrap();
        request.extend_from_slice(&buf[..n]);
        if n == 0 || request_complete(&request) {
          break;
        }
      }
      socket.write_all(reply.as_bytes()).await.unwrap();
      socket.shutdown().await.unwrap();
      String::from_utf8_lossy(&request).into_owned()
    });
    (base_url, handle)
  }

  /// Headers received and, if announced, the whole body.
  fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
      return false;
    };
    let length = head
      .lines()
      .find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name
          .eq_ignore_ascii_case("content-length")
          .then(|| value.trim().parse::<usize>().ok())
          .flatten()
      })
      .unwrap_or(0);
    body.len() >= length
  }

  fn transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(&ApiConfig {
      base_url: base_url.to_string(),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn success_decodes_json() {
    let (base_url, server) = serve_once("200 OK", "application/json", r#"{"count": 2}"#).await;

    let value = transport(&base_url)
      .send(Method::GET, "/api/psx/indices", None)
      .await
      .unwrap();

    assert_eq!(value, json!({"count": 2}));
    assert!(server.await.unwrap().starts_with("GET /api/psx/indices HTTP/1.1"));
  }

  #[tokio::test]
  async fn error_status_wins_over_non_json_body() {
    let (base_url, _server) =
      serve_once("503 Service Unavailable", "text/html", "<h1>down for maintenance</h1>").await;

    let err = transport(&base_url)
      .send(Method::GET, "/api/health", None)
      .await
      .unwrap_err();

    assert_eq!(err, FetchError::Http { status: 503 });
  }

  #[tokio::test]
  async fn malformed_success_body_is_a_decode_error() {
    let (base_url, _server) = serve_once("200 OK", "application/json", "{not json").await;

    let err = transport(&base_url)
      .send(Method::GET, "/api/psx/stocks", None)
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)), "got {:?}", err);
  }

  #[tokio::test]
  async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = transport(&base_url)
      .send(Method::GET, "/api/health", None)
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
  }

  #[tokio::test]
  async fn post_sends_json_body() {
    let (base_url, server) = serve_once(
      "200 OK",
      "application/json",
      r#"{"status": "scrape_started"}"#,
    )
    .await;

    let ack = transport(&base_url)
      .send(Method::POST, "/api/mufap/scrape", Some(json!({"force": true})))
      .await
      .unwrap();

    assert_eq!(ack["status"], "scrape_started");
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/mufap/scrape HTTP/1.1"));
    assert!(request.ends_with(r#"{"force":true}"#));
  }
}
