//! Payment page handler.
//!
//! Serves a self-contained HTML page with inline CSS/JS that drives the
//! create/consent/finish flow against this service's own API.

use crate::routes::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let client_wallet = escape_html(&state.client_wallet_address);
    let interval = escape_html(&state.schedule.interval.to_iso8601());
    let total_payments = state.schedule.additional_payments + 1;

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Recurring Payments</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f1117; color: #e0e0e0; padding: 20px; max-width: 760px; }}
  h1 {{ color: #58a6ff; margin-bottom: 8px; }}
  h2 {{ color: #c9d1d9; margin-bottom: 12px; font-size: 1.1em; }}
  .meta {{ color: #8b949e; font-size: 0.85em; margin-bottom: 20px; }}
  .section {{ background: #161b22; border: 1px solid #30363d; border-radius: 8px; padding: 16px 20px; margin-bottom: 20px; }}
  label {{ display: block; color: #8b949e; font-size: 0.85em; margin: 10px 0 4px; }}
  input {{ width: 100%; background: #0f1117; color: #e0e0e0; border: 1px solid #30363d; border-radius: 6px; padding: 8px 10px; font-size: 0.95em; }}
  button {{ margin-top: 14px; background: #238636; color: #fff; border: none; border-radius: 6px; padding: 8px 16px; font-size: 0.95em; cursor: pointer; }}
  button:disabled {{ background: #30363d; cursor: default; }}
  .mono {{ font-family: 'SF Mono', 'Consolas', monospace; font-size: 0.85em; word-break: break-all; }}
  .error {{ color: #f85149; margin-top: 10px; }}
  table {{ width: 100%; border-collapse: collapse; margin-top: 12px; }}
  th {{ color: #8b949e; text-align: left; padding: 6px 10px; font-size: 0.85em; text-transform: uppercase; border-bottom: 1px solid #30363d; }}
  td {{ padding: 6px 10px; border-bottom: 1px solid #21262d; font-size: 0.85em; }}
  a {{ color: #58a6ff; text-decoration: none; }}
  a:hover {{ text-decoration: underline; }}
</style>
</head>
<body>
  <h1>Recurring Payments</h1>
  <p class="meta">Client: <span class="mono">{client_wallet}</span> &middot; Interval: <span class="mono">{interval}</span> &middot; {total_payments} payments per approval &middot; Uptime: {uptime_str}</p>

  <div class="section">
    <h2>1. Set up payment</h2>
    <label for="sender">Sender wallet address</label>
    <input id="sender" placeholder="https://ilp.example.com/alice">
    <label for="receiver">Receiver wallet address</label>
    <input id="receiver" placeholder="https://ilp.example.com/bob">
    <label for="amount">Amount</label>
    <input id="amount" placeholder="10">
    <button id="create">Create payment</button>
    <div id="create-result"></div>
  </div>

  <div class="section">
    <h2>2. Finish payment</h2>
    <p class="meta">Approve the grant at the link above, then come back here.</p>
    <button id="finish" disabled>Finish payment</button>
    <div id="finish-result"></div>
  </div>

  <script>
    const KEY = 'recurring-payment';
    const $ = (id) => document.getElementById(id);
    const esc = (s) => String(s).replace(/[&<>"]/g, (c) => ({{ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;' }})[c]);

    function restore() {{
      const saved = JSON.parse(sessionStorage.getItem(KEY) || 'null');
      $('finish').disabled = !saved;
      return saved;
    }}

    async function readError(res) {{
      const text = await res.text();
      try {{
        const body = JSON.parse(text);
        return body.details ? body.error + ': ' + body.details : body.error;
      }} catch (_) {{
        return text;
      }}
    }}

    $('create').onclick = async () => {{
      const out = $('create-result');
      out.innerHTML = '';
      const sender = $('sender').value.trim();
      const res = await fetch('/create-payment', {{
        method: 'POST',
        headers: {{ 'Content-Type': 'application/json' }},
        body: JSON.stringify({{ sender_url: sender, receiver_url: $('receiver').value.trim(), amount: $('amount').value.trim() }}),
      }});
      if (!res.ok) {{
        out.innerHTML = '<p class="error">' + esc(await readError(res)) + '</p>';
        return;
      }}
      const body = await res.json();
      const r = body.response;
      sessionStorage.setItem(KEY, JSON.stringify({{
        quoteId: r.QUOTE_ID,
        continueUri: r.CONTINUE_URI,
        continueAccessToken: r.CONTINUE_ACCESS_TOKEN,
        sendingWalletAddressUrl: sender,
      }}));
      out.innerHTML = '<p class="meta" style="margin-top:10px">' + esc(body.message) + '</p>'
        + '<a href="' + esc(r.INTERACT_REDIRECT_URL) + '" target="_blank" rel="noopener">Approve payment</a>';
      restore();
    }};

    $('finish').onclick = async () => {{
      const out = $('finish-result');
      const saved = restore();
      if (!saved) return;
      $('finish').disabled = true;
      out.innerHTML = '<p class="meta" style="margin-top:10px">Sending payments...</p>';
      const res = await fetch('/finish-payment', {{
        method: 'POST',
        headers: {{ 'Content-Type': 'application/json' }},
        body: JSON.stringify(saved),
      }});
      sessionStorage.removeItem(KEY);
      if (!res.ok) {{
        out.innerHTML = '<p class="error">' + esc(await readError(res)) + '</p>';
        return;
      }}
      const body = await res.json();
      const rows = body.outgoingPayments.map((p) =>
        '<tr><td class="mono">' + esc(p.id) + '</td><td>' + (p.failed ? 'Failed' : 'Created') + '</td></tr>').join('');
      out.innerHTML = '<table><thead><tr><th>Outgoing payment</th><th>Status</th></tr></thead><tbody>'
        + (rows || '<tr><td colspan="2">No payments were created.</td></tr>') + '</tbody></table>';
    }};

    restore();
  </script>
</body>
</html>"#,
        client_wallet = client_wallet,
        interval = interval,
        total_payments = total_payments,
        uptime_str = uptime_str,
    );

    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
