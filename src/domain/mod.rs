//! Commitment rules that do not touch Telegram or the database: the weekly
//! schedule and its reminder triggers, the deposit countdown, and capture
//! window settlement.

pub mod capture;
pub mod deposit;
pub mod profile;
pub mod schedule;

pub use capture::*;
pub use deposit::*;
pub use profile::*;
pub use schedule::*;
