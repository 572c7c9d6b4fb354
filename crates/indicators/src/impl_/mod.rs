//! Bundled indicator unit implementations.

pub mod cross;
pub mod ema;
pub mod roc;
pub mod sma;
