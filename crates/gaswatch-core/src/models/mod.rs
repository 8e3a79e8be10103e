//! Data models for GasWatch

mod alert;
mod price;
mod recipient;

pub use alert::*;
pub use price::*;
pub use recipient::*;
