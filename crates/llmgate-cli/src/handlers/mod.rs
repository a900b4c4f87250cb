//! Command handlers, one module per subcommand.

pub mod serve;
