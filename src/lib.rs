//! scandesk - client for a scanned-document OCR and question answering service.
//!
//! The [`session::DocumentSession`] controller drives document browsing, the
//! per-document question thread, and archive export. The [`cli`] module is a
//! terminal front end on top of it.

pub mod api;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod export;
pub mod models;
pub mod session;
pub mod upload;
pub mod utils;
