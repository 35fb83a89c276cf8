//! Test modules for minimcp-server
//!
//! `fixtures` builds a server with one of everything; the other modules drive
//! it through `handle()` and the stdio transport.

pub mod stdio_tests;
