//! Scripted HTTP server for tests of outgoing requests.

use std::sync::{Arc, Mutex};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Answers one connection per scripted response, in order, and records what it was sent.
pub struct HttpStub {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HttpStub {
    pub async fn serve(responses: &[(u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let url = format!("http://{}", listener.local_addr().expect("stub address"));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let responses: Vec<(u16, String)> = responses
            .iter()
            .map(|(status, body)| (*status, body.to_string()))
            .collect();
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                seen.lock().expect("stub requests").push(request);

                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { url, requests }
    }

    /// Raw requests received so far, head and body.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("stub requests").clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let head_end = raw.windows(4).position(|window| window == b"\r\n\r\n");
        if let Some(head_end) = head_end {
            let head = String::from_utf8_lossy(&raw[..head_end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= head_end + 4 + length {
                break;
            }
        }

        match socket.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(read) => raw.extend_from_slice(&buffer[..read]),
        }
    }

    String::from_utf8_lossy(&raw).into_owned()
}
