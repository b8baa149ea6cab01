//! Deep links and the collaborators that open them.

use log::info;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::LinkOpenError;

/// Characters left unescaped in a URI component: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Hands a fully formed URL to whatever shows it to the operator.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LinkOpenError>;
}

/// Opens links with the system browser.
///
/// Only `http` and `https` links are handed over; anything else would be
/// dispatched to an arbitrary local handler.
pub struct BrowserOpener;

impl LinkOpener for BrowserOpener {
    fn open(&self, url: &str) -> Result<(), LinkOpenError> {
        if !is_web_link(url) {
            return Err(LinkOpenError::Rejected(format!(
                "refusing to open non-web link '{}'",
                url
            )));
        }
        webbrowser::open(url)?;
        Ok(())
    }
}

fn is_web_link(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

/// Dry-run opener: only logs the link.
pub struct LogOpener;

impl LinkOpener for LogOpener {
    fn open(&self, url: &str) -> Result<(), LinkOpenError> {
        info!("[dry-run] {}", url);
        Ok(())
    }
}

/// Percent-encodes `text` for use as a query value.
pub fn encode_message(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

/// Keeps only the digits of a country prefix as typed by the user.
pub fn sanitize_prefix(prefix: &str) -> String {
    prefix.chars().filter(char::is_ascii_digit).collect()
}

/// Builds `<base>/<address>?text=<encoded message>`.
pub fn deep_link(base_url: &str, address: &str, message: &str) -> String {
    format!(
        "{}/{}?text={}",
        base_url.trim_end_matches('/'),
        address,
        encode_message(message)
    )
}
