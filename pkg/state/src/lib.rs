//! SlateDB-backed state store, watch event log and leader election.

pub mod client;
pub mod leader;
pub mod watch;
