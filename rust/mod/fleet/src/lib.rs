//! USB installer drive fleet: catalog, drive lifecycle, audit trail and
//! the version currency engine.

pub mod model;
pub mod service;

pub use service::catalog::CatalogKind;
pub use service::{FleetError, FleetService};
