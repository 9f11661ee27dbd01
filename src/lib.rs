// src/lib.rs

//! stackflow: Stack Overflow Q&A collector and analytics library

pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
