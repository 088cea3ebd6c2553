//! services/mod.rs
//! Capas de negocio del job: datos, reporte, correo y orquestación.

pub mod dispatch_service;
pub mod email_service;
pub mod feedback_repository;
pub mod job_service;
pub mod report_service;
