//! iCAT Native - catalog client facade
//!
//! The only layer that talks to a catalog client implementation. It defines:
//! - [`NativeClient`] / [`NativeSession`]: the synchronous remote-call contract
//! - Owned record types exchanged over that contract
//! - Catalog status codes ([`NativeError`])
//! - The process-wide client environment ([`env`])
//! - [`MemoryCatalog`]: an in-process catalog implementing the contract

pub mod env;
pub mod memory;
pub mod records;
pub mod session;
pub mod status;

pub use memory::{MemoryCatalog, MemorySession};
pub use records::{
    AclRecord, AvuRecord, CollectionEntry, CollectionHandle, ConnectRequest, DataHandle, InfoMap,
    MetaTarget, ObjectKind, ObjectStat, OpenFlags,
};
pub use session::{NativeClient, NativeSession};
pub use status::{NativeError, NativeResult};
