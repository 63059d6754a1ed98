//! Integration tests for the streaming client against a local HTTP server.
//! The server speaks just enough HTTP/1.1 to capture one request and reply to it.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use tgpt::chat::{ChatConfig, ChatSession, Renderer, ResponseMode};
    use tgpt::{ChatClient, Completion, Conversation, DeltaCallback, Error};

    struct CapturedRequest {
        head: String,
        body: Vec<u8>,
    }

    /// Accepts one connection, records the request, and answers with `status` followed by
    /// each of `chunks` written separately.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        chunks: Vec<Vec<u8>>,
    ) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            let mut scratch = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut scratch).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buffer.extend_from_slice(&scratch[..n]);
                if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8(buffer[..header_end].to_vec()).unwrap();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            let mut body = buffer[header_end..].to_vec();
            while body.len() < content_length {
                let n = socket.read(&mut scratch).await.unwrap();
                assert!(n > 0, "client closed before sending the body");
                body.extend_from_slice(&scratch[..n]);
            }

            let response_head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n"
            );
            socket.write_all(response_head.as_bytes()).await.unwrap();
            for chunk in chunks {
                socket.write_all(&chunk).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            socket.shutdown().await.unwrap();
            CapturedRequest { head, body }
        });
        (format!("http://{addr}/v1/chat/completions"), handle)
    }

    fn sse(content: &str) -> Vec<u8> {
        format!(
            "data: {}\n\n",
            serde_json::json!({"id": "chatcmpl-1", "choices": [{"delta": {"content": content}}]})
        )
        .into_bytes()
    }

    fn client_for(endpoint: &str) -> ChatClient {
        ChatClient::with_options(b"sk-test", Some(endpoint), None, None).unwrap()
    }

    #[derive(Default)]
    struct CollectingRenderer {
        text: String,
        finished: usize,
    }

    impl Renderer for CollectingRenderer {
        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }
        fn print_label(&mut self, _label: &str) {}
        fn print_error(&mut self, _error: &str) {}
        fn print_info(&mut self, _info: &str) {}
        fn start_progress(&mut self) {}
        fn stop_progress(&mut self) {}
        fn finish_response(&mut self) {
            self.finished += 1;
        }
    }

    #[tokio::test]
    async fn streams_deltas_in_order() {
        let (endpoint, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![
                sse("Hel"),
                b": keep-alive\n\n".to_vec(),
                sse("lo"),
                b"data: [DONE]\n\n".to_vec(),
            ],
        )
        .await;
        let client = client_for(&endpoint);

        let mut conversation = Conversation::new();
        conversation.add_system_message("Be brief.");
        conversation.add_user_message("Say hello");

        let mut seen = Vec::new();
        let callback: DeltaCallback<'_> =
            &mut |text: &str| seen.push(text.to_string());
        let full = client.stream(&conversation, Some(callback)).await.unwrap();
        assert_eq!(full, "Hello");
        assert_eq!(seen, vec!["Hel".to_string(), "lo".to_string()]);

        let request = server.await.unwrap();
        assert!(request.head.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
        let head = request.head.to_lowercase();
        assert!(head.contains("authorization: bearer sk-test\r\n"));
        assert!(head.contains("content-type: application/json\r\n"));
        assert!(head.contains("accept: text/event-stream\r\n"));
        assert_eq!(request.body, conversation.serialize().unwrap());
    }

    #[tokio::test]
    async fn records_split_across_writes() {
        let record = sse("caf\u{e9} \u{2615}");
        let (first, rest) = record.split_at(record.len() - 12);
        let (endpoint, _server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![first.to_vec(), rest.to_vec(), b"data: not json\n".to_vec()],
        )
        .await;
        let full = client_for(&endpoint)
            .stream(&Conversation::new(), None)
            .await
            .unwrap();
        assert_eq!(full, "caf\u{e9} \u{2615}");
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_reply() {
        let (endpoint, _server) = serve_once("200 OK", "text/event-stream", vec![]).await;
        let full = client_for(&endpoint)
            .stream(&Conversation::new(), None)
            .await
            .unwrap();
        assert_eq!(full, "");
    }

    #[tokio::test]
    async fn error_status_is_upstream_error() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let (endpoint, _server) =
            serve_once("401 Unauthorized", "application/json", vec![body.to_vec()]).await;
        let err = client_for(&endpoint)
            .stream(&Conversation::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept() {
        let (endpoint, _server) = serve_once(
            "502 Bad Gateway",
            "text/plain",
            vec![b"upstream unavailable\n".to_vec()],
        )
        .await;
        let err = client_for(&endpoint)
            .stream(&Conversation::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = format!("http://{addr}/v1/chat/completions");
        let err = client_for(&endpoint)
            .stream(&Conversation::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });
        let endpoint = format!("http://{addr}/v1/chat/completions");
        let client = ChatClient::with_options(
            b"sk-test",
            Some(&endpoint),
            None,
            Some(Duration::from_millis(200)),
        )
        .unwrap();
        let err = client.stream(&Conversation::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn session_turn_is_remembered() {
        let (endpoint, server) = serve_once(
            "200 OK",
            "text/event-stream",
            vec![sse("Paris"), sse(".")],
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let memory = dir.path().join("memory.json");
        let config = ChatConfig::new()
            .with_system_prompt("Answer in one word.")
            .with_mode(ResponseMode::Quiet)
            .with_memory_path(Some(memory.clone()));
        let mut session = ChatSession::new(client_for(&endpoint), config).unwrap();
        let mut renderer = CollectingRenderer::default();

        let reply = session
            .send("Capital of France?", &mut renderer)
            .await
            .unwrap();
        assert_eq!(reply, "Paris.");
        assert_eq!(renderer.text, "Paris.");
        assert_eq!(renderer.finished, 1);

        let request = server.await.unwrap();
        let sent = Conversation::deserialize(&request.body).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent.last_message().unwrap().content(), "Capital of France?");

        let saved = Conversation::load(&memory).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.last_message().unwrap().content(), "Paris.");
    }
}
