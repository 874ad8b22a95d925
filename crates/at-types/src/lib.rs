pub mod config;
pub mod errors;
pub mod space;
pub mod value;

pub use config::*;
pub use errors::*;
pub use space::*;
pub use value::*;

/// Lower is better; `INFINITE_COST` marks infeasible, out-of-range, or
/// unmeasured-and-excluded coordinates.
pub type Cost = f64;

pub const INFINITE_COST: Cost = f64::INFINITY;
