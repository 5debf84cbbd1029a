//! Resource data-transfer objects for the LXD REST API.
//!
//! These types are thin mappings of the daemon's JSON resources; they carry
//! no behaviour beyond serialization. Unknown fields are ignored on decode
//! so the client tolerates daemon versions that grow the wire format.

mod containers;
mod images;
mod server;

pub use containers::{ContainerAction, ContainerInfo, ContainerState, Device};
pub use images::{ImageAlias, ImageAliasesEntry, ImageInfo};
pub use server::{Network, ServerState};
