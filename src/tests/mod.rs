//! tests/mod.rs
//! Pruebas del job con fuentes de datos y transportes en memoria.

mod email_tests;
mod support;
