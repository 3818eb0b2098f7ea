//! HTTP handlers for model CRUD, CSV transfer and the settings document.

pub mod entity;
pub mod settings;
pub mod transfer;
