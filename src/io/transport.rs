//! Process-shared HTTP transport, initialised exactly once per lifetime.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::config::TransportConfig;
use crate::error::SourceError;

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// Lazily built HTTP client shared by every remote source.
///
/// The first caller to need the client claims initialisation with a
/// compare-and-set; concurrent callers wait for it instead of building their
/// own. [`Transport::reset`] returns it to the uninitialised state so the next
/// remote open builds a fresh client.
pub struct Transport {
    config: TransportConfig,
    state: AtomicU8,
    client: Mutex<Option<Client>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(UNINIT),
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Returns the shared client, building it on first use.
    pub fn client(&self) -> Result<Client, SourceError> {
        loop {
            match self
                .state
                .compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let built = build_client(&self.config);
                    return match built {
                        Ok(client) => {
                            *self.slot() = Some(client.clone());
                            self.state.store(READY, Ordering::Release);
                            info!(
                                "HTTP transport ready (tls verification {})",
                                if self.config.verify_tls { "on" } else { "off" }
                            );
                            Ok(client)
                        }
                        Err(e) => {
                            self.state.store(UNINIT, Ordering::Release);
                            Err(e.into())
                        }
                    };
                }
                Err(READY) => {
                    if let Some(client) = self.slot().clone() {
                        return Ok(client);
                    }
                    // reset raced us between the load and the lock
                }
                Err(_) => std::thread::yield_now(),
            }
        }
    }

    /// Drops the shared client. Sources that already hold a clone keep working.
    pub fn reset(&self) {
        loop {
            match self
                .state
                .compare_exchange(READY, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let client = self.slot().take();
                    self.state.store(UNINIT, Ordering::Release);
                    drop(client);
                    debug!("HTTP transport reset");
                    return;
                }
                Err(UNINIT) => return,
                Err(_) => std::thread::yield_now(),
            }
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn build_client(config: &TransportConfig) -> reqwest::Result<Client> {
    Client::builder()
        // some proxies and CDNs stall on HTTP/2 negotiation
        .http1_only()
        .redirect(Policy::limited(config.max_redirects))
        .connect_timeout(config.connect_timeout)
        .timeout(config.total_timeout)
        .tcp_keepalive(config.tcp_keepalive)
        .tcp_keepalive_interval(config.tcp_keepalive_interval)
        .pool_idle_timeout(config.pool_idle_timeout)
        .danger_accept_invalid_certs(!config.verify_tls)
        .user_agent(concat!("wigrange/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn client_is_built_once_and_reset() {
        let transport = Transport::new(TransportConfig::default());
        assert!(!transport.is_ready());
        transport.client().unwrap();
        assert!(transport.is_ready());
        transport.reset();
        assert!(!transport.is_ready());
        // reset on an idle transport is a no-op
        transport.reset();
        transport.client().unwrap();
        assert!(transport.is_ready());
    }

    #[test]
    fn concurrent_first_use() {
        let transport = Arc::new(Transport::new(TransportConfig::default()));
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let transport = transport.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    transport.client().is_ok()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert!(transport.is_ready());
    }
}
