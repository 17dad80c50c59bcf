//! Session handle over an injected client.
//!
//! There is no process-wide client singleton: application code constructs a
//! [`Session`] around whatever [`VectorClient`] implementation it uses and
//! passes the handle to each entity store. Closing the session is explicit;
//! handles cloned out of it stay valid for operations already in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use crate::client::VectorClient;
use crate::error::{QuiverError, Result};

/// Connection parameters for a client implementation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectOptions {
    /// Server URI.
    pub uri: String,
    /// Authentication token, if the deployment requires one.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            uri: "http://localhost:19530".to_string(),
            token: None,
        }
    }
}

/// An open connection to the backing service.
#[derive(Clone)]
pub struct Session {
    client: Arc<dyn VectorClient>,
    options: ConnectOptions,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("uri", &self.options.uri)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Session {
    /// Open a session over an already-constructed client.
    pub fn new(client: Arc<dyn VectorClient>, options: ConnectOptions) -> Self {
        Session {
            client,
            options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The connection options this session was opened with.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Borrow the client handle for a new entity store.
    ///
    /// Fails once the session has been closed.
    pub fn client(&self) -> Result<Arc<dyn VectorClient>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QuiverError::Client(anyhow::anyhow!("session is closed")));
        }
        Ok(self.client.clone())
    }

    /// Check whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the session. Idempotent; returns whether this call closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}
