//! Host command protocol: line framing, argument parsing, verb dispatch and
//! the packet transmitter used for replies and log retrieval.

pub mod args;
pub mod dispatch;
pub mod line;
pub mod stream;

pub use dispatch::{CommandEnv, Flow, dispatch};
pub use line::{Line, LineCollector};
