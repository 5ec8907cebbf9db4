//! CLI subcommands

pub mod inspect;
pub mod pack;
pub mod run;
pub mod watch;
