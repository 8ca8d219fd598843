// src/control/mod.rs
pub mod pid;

pub use pid::{Pid, PidStats};
