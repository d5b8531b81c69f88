// Library interface for the rdsh shell and server
// The binaries, integration tests and benchmarks build on these modules

pub mod builtins;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod shell;
pub mod signal;
