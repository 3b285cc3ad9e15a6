//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache maintenance: evicts aged images at configured intervals

mod maintenance;

pub use maintenance::spawn_maintenance_task;
