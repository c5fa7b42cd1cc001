//! Membership bookkeeping for clusters built from pre-existing machines.
//!
//! A create or join pass seeds a [`registry::NodeRegistry`] from the
//! requested addresses, folds it into durable [`types::Status`] with
//! [`reconcile::reconcile`], and leaves a phase marker behind
//! ([`state`]) until the installer is done. Nodes a failed pass introduced
//! can be undone with [`rollback::rollback`].

pub mod error;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod rollback;
pub mod runtime;
pub mod state;
pub mod types;

pub use error::{DecommissionWarning, Error, Result};
pub use provider::NativeProvider;
pub use registry::NodeRegistry;
