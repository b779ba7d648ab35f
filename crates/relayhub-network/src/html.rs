//! HTML pages: the status/control page, the shutdown page and the error page.

use relayhub_core::{RelayIndex, RelayState};
use std::fmt::Write as _;

/// One relay line of the status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRow {
    pub relay: RelayIndex,
    pub label: String,
    pub state: RelayState,
}

/// One card (or board) section of the status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSection {
    pub heading: String,
    pub detail: String,
    /// Serial used by the toggle script; `None` renders "Card not found".
    pub serial: Option<String>,
    pub relays: Vec<RelayRow>,
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
section{border:1px solid #ccc;border-radius:6px;padding:1em;margin-bottom:1em}\
h2{margin:0 0 .2em 0}.detail{color:#666;margin:0 0 .8em 0}\
button{min-width:4em;margin-left:1em}.on{background:#6c6}.off{background:#ccc}";

const SCRIPT: &str = "function toggle(serial, relay, value) {\
 fetch('/api/serial/' + encodeURIComponent(serial) + '/' + relay + '/' + value)\
 .then(function () { location.reload(); });\
}";

/// Escape text for HTML bodies and single-quoted attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\\' => out.push_str("&#92;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style><script>{SCRIPT}</script></head>\n<body>\n{body}</body></html>\n"
    )
}

/// Render the status/control page.
#[must_use]
pub fn status_page(sections: &[CardSection]) -> String {
    let mut body = String::from("<h1>Relay cards</h1>\n");

    if sections.is_empty() {
        body.push_str("<p>No compatible device detected.</p>\n");
    }

    for section in sections {
        let _ = write!(
            body,
            "<section><h2>{}</h2><p class=\"detail\">{}</p>\n",
            escape(&section.heading),
            escape(&section.detail)
        );
        match &section.serial {
            None => body.push_str("<p>Card not found</p>\n"),
            Some(serial) => {
                let serial = escape(serial);
                body.push_str("<table>\n");
                for row in &section.relays {
                    let on = row.state == RelayState::On;
                    let _ = writeln!(
                        body,
                        "<tr><td>Relay {relay}</td><td>{label}</td><td>\
                         <button class=\"{class}\" onclick=\"toggle('{serial}', {relay}, {next})\">{text}</button>\
                         </td></tr>",
                        relay = row.relay,
                        label = escape(&row.label),
                        class = if on { "on" } else { "off" },
                        next = u8::from(!on),
                        text = if on { "ON" } else { "OFF" },
                    );
                }
                body.push_str("</table>\n");
            }
        }
        body.push_str("</section>\n");
    }

    page("relayhub", &body)
}

/// Page returned by `/quit`.
#[must_use]
pub fn quit_page() -> String {
    page("relayhub", "<p>Program stopped</p>\n")
}

/// Page returned with a 500 status.
#[must_use]
pub fn error_page(message: &str) -> String {
    page("relayhub", &format!("<p>ERROR: {}</p>\n", escape(message)))
}
