//! Browser-side live-reload client.

use crate::utils::text::rfind_ci;

/// Inject the reload client before `</body>` (or at the end of `doc`).
pub fn inject_client(doc: &str, port: u16) -> String {
    let script = client_script(port);
    match rfind_ci(doc, "</body>") {
        Some(pos) => format!("{}{script}\n{}", &doc[..pos], &doc[pos..]),
        None => format!("{doc}\n{script}\n"),
    }
}

fn client_script(port: u16) -> String {
    format!(
        r#"<script data-kiln-reload>
(() => {{
  const connect = () => {{
    const ws = new WebSocket("ws://127.0.0.1:{port}");
    ws.onmessage = (event) => {{
      try {{
        if (JSON.parse(event.data).type === "reload") location.reload();
      }} catch (_) {{}}
    }};
    ws.onclose = () => setTimeout(connect, 1000);
  }};
  connect();
}})();
</script>"#
    )
}
