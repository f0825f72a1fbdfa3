pub mod artifacts;
pub mod images;
pub mod status;
pub mod symbols;
pub mod util;

pub use artifacts::*;
pub use images::*;
pub use status::*;
pub use symbols::*;
pub use util::*;
