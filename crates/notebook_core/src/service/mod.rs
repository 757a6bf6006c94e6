//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate mapper reads and unit-of-work commits into request-level flows.
//! - Keep callers decoupled from rows, SQL and backend choice.

pub mod notebook_service;

pub use notebook_service::{
    NotebookService, NotebookServiceError, NotebookServiceResult, COPY_PREFIX,
};
