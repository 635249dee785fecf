//! Common structs for delivery orders shared across crates.

mod columns;
mod features;
mod single;
mod table;
mod weekday;

pub use columns::*;
pub use features::*;
pub use single::*;
pub use table::*;
pub use weekday::*;
