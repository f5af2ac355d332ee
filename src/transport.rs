use reqwest::{Client, StatusCode};
use serde::Serialize;
use anyhow::{Context, Result, anyhow};
use crate::config::Config;
use crate::history::Message;
use crate::stream::accumulate;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    #[serde(rename = "preMessage")]
    pre_message: &'a str,
}

/// Client for the streaming chat endpoint. One call is one turn.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    pre_message: String,
}

impl ChatClient {
    pub fn new(endpoint: &str, pre_message: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            pre_message: pre_message.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.endpoint, &config.pre_message)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the history and stream the reply.
    ///
    /// `on_update` sees the full cleaned reply after every chunk. No retry
    /// and no timeout: a stalled body keeps this future pending.
    pub async fn stream_chat<F>(&self, messages: &[Message], on_update: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let request = ChatRequest {
            messages,
            pre_message: &self.pre_message,
        };

        tracing::info!(endpoint = %self.endpoint, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.endpoint))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Chat request failed with status: {}",
                response.status()
            ));
        }

        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(anyhow!("No response body"));
        }

        let reply = accumulate(response.bytes_stream(), on_update).await?;
        tracing::info!(chars = reply.chars().count(), "chat response complete");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one connection: read the whole request, then write `head`
    /// followed by each body chunk. Resolves to the raw request body.
    async fn serve_once(head: &'static str, body: Vec<&'static str>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/chat", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before sending body");
                request.extend_from_slice(&buf[..n]);
            }

            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in body {
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            socket.shutdown().await.unwrap();

            String::from_utf8(request[header_end..].to_vec()).unwrap()
        });

        (url, handle)
    }

    const STREAM_HEAD: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\nconnection: close\r\n\r\n";

    #[tokio::test]
    async fn test_streams_and_cleans_reply() {
        let (url, server) = serve_once(
            STREAM_HEAD,
            vec!["assistant: ", "Hel", "lo wor", "ld|im_end|", "\n"],
        )
        .await;

        let client = ChatClient::new(&url, "Be helpful.");
        let mut updates = Vec::new();
        let reply = client
            .stream_chat(&[Message::user("hi")], |text| updates.push(text.to_string()))
            .await
            .unwrap();

        assert_eq!(reply.trim_end(), "Hello world");
        assert!(!updates.is_empty());
        assert!(updates.iter().all(|u| !u.contains("|im_end|")));

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["preMessage"], "Be helpful.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn test_error_status() {
        let (url, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            vec![],
        )
        .await;

        let client = ChatClient::new(&url, "");
        let err = client.stream_chat(&[], |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let (url, _server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            vec![],
        )
        .await;

        let client = ChatClient::new(&url, "");
        let err = client.stream_chat(&[], |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "No response body");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/chat", listener.local_addr().unwrap());
        drop(listener);

        let client = ChatClient::new(&url, "");
        let err = client.stream_chat(&[Message::user("hi")], |_| {}).await.unwrap_err();
        assert!(err.to_string().starts_with("could not reach"));
    }
}
