//! Directory-to-remote account synchronization.
//!
//! Main components:
//! - [`config`]: layered settings, schema construction and rule compilation
//! - [`directory`]: directory snapshot loading: groups, classes of service,
//!   aliases, domain rewriting and selection
//! - [`remote`]: the remote account service contract and remote snapshots
//! - [`retry`]: session-expiry retry around remote calls
//! - [`forward`]: the create / update / retire passes
//! - [`reconcile`]: three-way drift classification with cache repair
//! - [`maintenance`]: purging retired accounts, record import and export,
//!   class-of-service renames
//!
//! Everything is synchronous and single-threaded. The local cache only
//! records what the remote service has confirmed.

pub mod config;
pub mod directory;
pub mod error;
pub mod forward;
pub mod maintenance;
pub mod reconcile;
pub mod remote;
pub mod retry;

pub use config::{CompiledRules, SyncSettings};
pub use directory::{DirectoryLoader, DirectorySnapshot, DirectorySource};
pub use error::{SyncError, SyncResult};
pub use forward::{ForwardSynchronizer, SyncReport, UpdateStep};
pub use maintenance::{LoadReport, PurgeReport};
pub use reconcile::{
    Classification, CorrectiveAction, DriftState, ReconcileReport, ReconciliationClassifier,
};
pub use remote::{RemoteAccountService, RemoteError, RemoteResult, RemoteSnapshot};
pub use retry::RetryPolicy;
