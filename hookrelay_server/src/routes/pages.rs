//! Browser pages: home, endpoint creation and the live endpoint view

use crate::names::generate_endpoint_name;
use crate::routes::AppState;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::Host;

/// Build the page router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/favicon", get(not_found))
        .route("/robots", get(not_found))
        .route("/endpoint", post(create_endpoint))
        .route("/{endpoint}", get(endpoint_page))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn home() -> Html<&'static str> {
    Html(HOME_HTML)
}

/// Mint a fresh endpoint name and send the browser to its page
async fn create_endpoint() -> Redirect {
    let endpoint_id = generate_endpoint_name();
    tracing::info!("Created endpoint {}", endpoint_id);
    Redirect::to(&format!("/{}", endpoint_id))
}

async fn endpoint_page(Path(endpoint_id): Path<String>, Host(host): Host, headers: HeaderMap) -> Html<String> {
    let secure = headers
        .get("X-Forwarded-Proto")
        .and_then(|v| v.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false);
    let (http, ws) = if secure { ("https", "wss") } else { ("http", "ws") };

    let capture_url = format!("{}://{}/to/{}", http, host, endpoint_id);
    let viewer_url = format!("{}://{}/ws/{}", ws, host, endpoint_id);

    Html(
        ENDPOINT_HTML
            .replace("{{endpoint}}", &escape_html(&endpoint_id))
            .replace("{{capture_url}}", &escape_html(&capture_url))
            .replace("{{viewer_url}}", &escape_html(&viewer_url)),
    )
}

/// Minimal escaping for text and double-quoted attribute values
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const HOME_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Home | hookrelay</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <style>
    body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; }
    button { font-size: 1rem; padding: .6rem 1.2rem; cursor: pointer; }
  </style>
</head>
<body>
  <h1>hookrelay</h1>
  <p>Create a disposable endpoint, point any HTTP client at it and watch requests arrive live.</p>
  <form method="post" action="/endpoint">
    <button type="submit" data-test="create-endpoint">Create endpoint</button>
  </form>
</body>
</html>
"#;

const ENDPOINT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Endpoint | hookrelay</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <style>
    body { font-family: system-ui, sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; }
    code { background: #f2f2f2; padding: .1rem .3rem; }
    .banner { display: none; background: #fde2e2; padding: .5rem; }
    .request { border: 1px solid #ddd; margin: .5rem 0; padding: .5rem; }
    .request pre { white-space: pre-wrap; word-break: break-all; margin: .3rem 0; }
  </style>
</head>
<body data-endpoint="{{endpoint}}" data-viewer-url="{{viewer_url}}">
  <h1>{{endpoint}}</h1>
  <p>Send requests to <code data-test="unique-endpoint-url">{{capture_url}}</code></p>
  <p><input type="search" id="search" placeholder="Search bodies and headers"></p>
  <div class="banner" id="banner"></div>
  <div id="requests"></div>
  <script>
    const endpoint = document.body.dataset.endpoint;
    const list = document.getElementById("requests");
    const banner = document.getElementById("banner");

    function render(req, prepend) {
      const el = document.createElement("div");
      el.className = "request";
      const title = document.createElement("strong");
      title.textContent = req.method + " " + req.path + " from " + req.sourceIP + " at " + req.createdAt;
      const headers = document.createElement("pre");
      headers.textContent = JSON.stringify(req.headers, null, 2);
      const body = document.createElement("pre");
      body.textContent = req.body;
      el.append(title, headers, body);
      prepend ? list.prepend(el) : list.append(el);
    }

    function showError(message) {
      banner.textContent = message;
      banner.style.display = "block";
    }

    async function load() {
      const search = document.getElementById("search").value;
      const url = "/api/endpoints/" + encodeURIComponent(endpoint) + "/requests?search=" + encodeURIComponent(search);
      try {
        const res = await fetch(url);
        if (!res.ok) throw new Error(res.statusText);
        const data = await res.json();
        list.replaceChildren();
        data.requests.forEach((req) => render(req, false));
      } catch (e) {
        showError("Could not load request history: " + e.message);
      }
    }

    function connect() {
      const socket = new WebSocket(document.body.dataset.viewerUrl);
      socket.onmessage = (msg) => {
        const event = JSON.parse(msg.data);
        if (event.type === "request" && document.getElementById("search").value === "") {
          render(event.data, true);
        }
      };
      socket.onclose = () => {
        showError("Live connection lost, reconnecting...");
        setTimeout(connect, 2000);
      };
      socket.onopen = () => { banner.style.display = "none"; };
    }

    document.getElementById("search").addEventListener("input", load);
    load();
    connect();
  </script>
</body>
</html>
"#;
