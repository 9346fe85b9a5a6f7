//! Runtime services: the compositor connection, the control socket, the
//! event loop that ties them together, and snapshot output.

pub mod compositor;
pub mod control;
pub mod multiplexer;
pub mod output;
pub mod signal;
