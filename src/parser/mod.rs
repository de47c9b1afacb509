//! ANSI escape handling for the log
//!
//! A stateful SGR parser that converts text into styled runs, and a
//! stateless stripper for when coloring is off.

mod sgr;
mod strip;

pub use sgr::AnsiStyleParser;
pub use strip::strip;
