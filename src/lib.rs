pub mod aggregate;
pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod git;
pub mod parsers;
pub mod prompt;
pub mod response;
