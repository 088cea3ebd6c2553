//! config/mod.rs
//! Configuración de la aplicación, cargada una sola vez al arrancar.

pub mod app_config;
