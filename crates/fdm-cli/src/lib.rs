//! Library side of the `fdm` command line tool.

pub mod cli;
pub mod logging;
pub mod pipeline;
pub mod workspace;
