use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde_json::{Value, json};

pub fn login_page_html(token_name: &str, token_value: &str) -> String {
    format!(
        r#"<html><body>
<form method="post" action="/log-in">
  <div class="login-form">
    <input name="{token_name}" type="hidden" value="{token_value}">
    <input name="Username" type="text" value="">
    <input name="Password" type="password" value="">
  </div>
</form>
</body></html>"#
    )
}

pub fn account_selector_json(account_number: &str) -> String {
    json!([{"accountNumber": account_number, "description": "Home"}]).to_string()
}

pub fn dashboard_json(street: &str, premise_id: &str) -> String {
    json!({
        "addresses": [{"street": street, "premiseId": premise_id, "city": "Topeka"}],
        "billAmount": 142.55,
        "isPastDue": false,
        "dueDate": "2024-05-21"
    })
    .to_string()
}

pub fn usage_record_json(period: &str, usage: f64, cost: f64) -> Value {
    json!({
        "period": period,
        "billDate": "2024-05-01",
        "usage": usage,
        "demand": 4.1,
        "avgDemand": 2.0,
        "peakDemand": 4.2,
        "peakDateTime": format!("{period}T17:00:00"),
        "maxTemp": 75.0,
        "minTemp": 55.0,
        "avgTemp": 63.0,
        "cost": cost,
        "balance": 47.9
    })
}

pub fn usage_json(records: &[Value]) -> String {
    json!({"data": records}).to_string()
}

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub line: String,
    pub body: String,
}

/// Serves a fixed sequence of responses in request order and records each
/// request, so tests can drive multi-step portal conversations that a
/// path-matched mock cannot sequence.
pub struct ScriptedPortalServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

const SHUTDOWN_PATH: &str = "/shutdown-test-responder";

impl ScriptedPortalServer {
    pub fn start(script: Vec<ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("responder socket should bind");
        let base_url = format!(
            "http://{}",
            listener.local_addr().expect("addr should be available")
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = std::thread::spawn(move || {
            let mut script = script.into_iter();

            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let Some(request) = read_request(&mut stream) else {
                    continue;
                };

                if request.line.contains(SHUTDOWN_PATH) {
                    write_response(&mut stream, &ScriptedResponse::status(204, ""));
                    break;
                }

                recorded
                    .lock()
                    .expect("request log lock should be available")
                    .push(request);

                let response = script
                    .next()
                    .unwrap_or_else(|| ScriptedResponse::status(500, "response script exhausted"));
                write_response(&mut stream, &response);
            }
        });

        Self {
            base_url,
            requests,
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stops the responder and returns everything it saw, in order.
    pub fn shutdown(mut self) -> Vec<RecordedRequest> {
        let address = self
            .base_url
            .trim_start_matches("http://")
            .to_string();
        if let Ok(mut stream) = TcpStream::connect(&address) {
            let _ = stream.write_all(
                format!("GET {SHUTDOWN_PATH} HTTP/1.1\r\nHost: {address}\r\n\r\n").as_bytes(),
            );
        }
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .expect("responder thread should terminate cleanly");
        }

        self.requests
            .lock()
            .expect("request log lock should be available")
            .clone()
    }
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let line = request_line
        .trim_end()
        .trim_end_matches(" HTTP/1.1")
        .to_string();

    let mut content_length = 0_usize;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header
            .to_ascii_lowercase()
            .strip_prefix("content-length:")
            .map(str::trim)
        {
            content_length = value.parse().unwrap_or(0);
        }
    }

    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }

    Some(RecordedRequest {
        line,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_response(stream: &mut TcpStream, response: &ScriptedResponse) {
    let reason = match response.status {
        200 => "OK",
        204 => "No Content",
        302 => "Found",
        403 => "Forbidden",
        500 => "Internal Server Error",
        _ => "Scripted",
    };
    let payload = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(payload.as_bytes());
}
