mod dashboard;
mod drive;
mod event;
mod model;
mod platform;
mod status;
mod technician;
mod usb_type;
mod version;

pub use dashboard::*;
pub use drive::*;
pub use event::*;
pub use model::*;
pub use platform::*;
pub use status::*;
pub use technician::*;
pub use usb_type::*;
pub use version::*;

/// Integer primary key of every table.
pub type DbId = i64;
