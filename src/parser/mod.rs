//! Parser module for brisk.

mod core;
mod declarations;
mod expressions;
mod precedence;
mod statements;

#[cfg(test)]
mod tests;

pub use self::core::{ParseResult, Parser};
pub use self::precedence::Level;
