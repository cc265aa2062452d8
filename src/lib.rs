#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod replay;
pub mod util;
