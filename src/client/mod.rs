//! Client half of the portal.
//!
//! `SessionContext` owns the credential pair and the identity snapshot; `ApiClient` is the
//! only code that talks to the server and the only code that reacts to a 401. The views
//! (`AuthFlow`, `AdminConsole`, `UserView`) sit on top and report `ViewOutcome`s.

pub mod api;
pub mod console;
pub mod context;
pub mod error;
pub mod flow;
pub mod gate;
pub mod identity;
pub mod outcome;
pub mod pending;
pub mod session;
pub mod storage;
pub mod transport;
pub mod user_view;

use std::sync::Arc;

use crate::config::ClientConfig;

pub use api::ApiClient;
pub use console::{AdminConsole, ConsoleStatus};
pub use context::{SESSION_EXPIRED_MESSAGE, SessionContext};
pub use error::{ClientError, TransportError};
pub use flow::AuthFlow;
pub use gate::{AccessGate, Destination, GateDecision, GateState, Route};
pub use identity::IdentityContext;
pub use outcome::ViewOutcome;
pub use pending::PendingFlag;
pub use session::{SessionStore, StoredPair};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, RouterTransport, Transport};
pub use user_view::{PagePermissions, UserView};

/// Builds the HTTP client stack from configuration: file-backed storage when a session
/// file is configured, process memory otherwise.
pub fn connect(config: &ClientConfig) -> Result<ApiClient, ClientError> {
    let storage: Arc<dyn CredentialStorage> = match &config.session_file {
        Some(path) => Arc::new(FileStorage::new(path)?),
        None => Arc::new(MemoryStorage::new()),
    };
    let transport = HttpTransport::new(config)?;
    Ok(ApiClient::new(
        Arc::new(transport),
        Arc::new(SessionContext::new(storage)),
    ))
}
