use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use url::Url;

use super::{ByteSource, Fetched, read_full};
use crate::config::TransportConfig;
use crate::error::SourceError;

const DEFAULT_PORT: u16 = 21;
const ANONYMOUS: &str = "anonymous";

/// Where an `ftp://` identifier points and how to log in there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FtpTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub path: String,
}

impl FtpTarget {
    /// Credentials come from the URL, falling back to anonymous.
    pub fn parse(identifier: &str) -> Result<Self, SourceError> {
        let url = Url::parse(identifier)?;
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        let user = match url.username() {
            "" => ANONYMOUS,
            user => user,
        };
        Ok(Self {
            host: host.to_string(),
            port: url.port_or_known_default().unwrap_or(DEFAULT_PORT),
            user: user.to_string(),
            password: url.password().unwrap_or(ANONYMOUS).to_string(),
            path: url.path().to_string(),
        })
    }
}

/// FTP source that fetches byte ranges with `REST` + `RETR`
pub struct FtpSource {
    stream: FtpStream,
    path: String,
    size: Option<u64>,
    read_timeout: Duration,
}

impl FtpSource {
    /// Connect and log in.
    pub fn connect(identifier: &str, config: &TransportConfig) -> Result<Self, SourceError> {
        let target = FtpTarget::parse(identifier)?;
        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("cannot resolve {}", target.host),
                )
            })?;

        // bounded before the greeting is read
        let socket = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
        socket.set_read_timeout(Some(config.total_timeout))?;
        let mut stream = FtpStream::connect_with_stream(socket)?;
        stream.login(&target.user, &target.password)?;
        stream.transfer_type(FileType::Binary)?;

        let size = match stream.size(&target.path) {
            Ok(size) => Some(size as u64),
            Err(e) => {
                debug!("SIZE {} unavailable: {e}", target.path);
                None
            }
        };

        Ok(Self {
            stream,
            path: target.path,
            size,
            read_timeout: config.total_timeout,
        })
    }
}

impl ByteSource for FtpSource {
    fn fetch(&mut self, offset: u64, buf: &mut [u8]) -> Result<Fetched, SourceError> {
        if buf.is_empty() || self.size.is_some_and(|size| offset >= size) {
            return Ok(Fetched::default());
        }
        let restart = rest_offset(offset)?;

        debug!("RETR {} from offset {} ({} bytes)", self.path, offset, buf.len());
        self.stream.resume_transfer(restart)?;
        let mut data = self.stream.retr_as_stream(&self.path)?;
        // a stalled data connection must not block forever
        data.get_ref().set_read_timeout(Some(self.read_timeout))?;
        let filled = read_full(&mut data, buf)?;

        if filled < buf.len() {
            self.stream.finalize_retr_stream(data)?;
        } else {
            // stop the transfer once the window is full
            self.stream.abort(data)?;
        }
        Ok(Fetched::exact(filled))
    }

    fn is_local(&self) -> bool {
        false
    }

    fn len(&self) -> Option<u64> {
        self.size
    }
}

/// `REST` takes a `usize`; offsets past it fail instead of wrapping.
fn rest_offset(offset: u64) -> Result<usize, SourceError> {
    usize::try_from(offset).map_err(|_| {
        SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("offset {offset} does not fit a REST command on this platform"),
        ))
    })
}

impl Drop for FtpSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.quit() {
            debug!("FTP quit for {} failed: {e}", self.path);
        }
    }
}
