use std::io::Read;

use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, HeaderMap, RANGE};

use super::{ByteSource, Fetched, Scheme, read_full};
use crate::error::SourceError;

/// HTTP/HTTPS source that fetches byte ranges on demand
pub struct HttpSource {
    client: Client,
    url: String,
    scheme: Scheme,
    size: Option<u64>,
}

impl HttpSource {
    /// Create a source for `url`. No request is sent until the first fetch.
    pub fn new(url: &str, client: Client) -> Self {
        Self {
            client,
            url: url.to_string(),
            scheme: Scheme::detect(url),
            size: None,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}

impl ByteSource for HttpSource {
    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> Result<Fetched, SourceError> {
        if buf.is_empty() {
            return Ok(Fetched::default());
        }
        if self.size.is_some_and(|size| offset >= size) {
            return Ok(Fetched::default());
        }

        let end = offset + buf.len() as u64 - 1;
        let range = format!("bytes={offset}-{end}");
        debug!("GET {} Range: {}", self.url, range);

        let mut resp = self.client.get(&self.url).header(RANGE, range).send()?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {
                if let Some(total) = content_range_total(resp.headers()) {
                    self.size = Some(total);
                }
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                if let Some(total) = content_range_total(resp.headers()) {
                    self.size = Some(total);
                }
                return Ok(Fetched::default());
            }
            // server ignored the range and sent the whole body
            StatusCode::OK if offset == 0 => {
                self.size = resp.content_length();
            }
            StatusCode::OK => return Err(SourceError::RangeNotSupported),
            status => {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    url: self.url.clone(),
                });
            }
        }

        Ok(drain_into(&mut resp, buf)?)
    }

    fn is_local(&self) -> bool {
        false
    }

    fn len(&self) -> Option<u64> {
        self.size
    }
}

/// Copies the body into `buf`, then drains whatever is left so the
/// connection can be reused. Drained bytes are reported as overflow.
pub(super) fn drain_into(body: &mut impl Read, buf: &mut [u8]) -> std::io::Result<Fetched> {
    let filled = read_full(body, buf)?;
    let overflow = std::io::copy(body, &mut std::io::sink())?;
    Ok(Fetched {
        bytes: filled,
        overflow,
    })
}

/// Parses the total length out of `Content-Range: bytes a-b/total`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
