// src/tests/mod.rs
mod support;

mod client_tests;
mod server_tests;
