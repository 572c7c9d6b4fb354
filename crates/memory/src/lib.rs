//! Vega Memory
//!
//! Memory governor for the Vega indicator engine: periodic usage sampling,
//! soft/hard/emergency pressure levels, leak-slope detection per tracked
//! component, and escalating reclamation directives.

pub mod governor;
pub mod leak;

pub use governor::{
    GovernorOutcome, MemoryGovernor, MemorySample, PressureAlert, PressureLevel, ReclaimAction,
};
pub use leak::{LeakReport, LeakSuspect, SuspicionLevel};
