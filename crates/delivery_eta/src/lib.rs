//! Delivery ETA Predictor
//!
//! Trains a delivery-time model from uploaded orders, or reuses the stored
//! one, and serves batch and single-order predictions.

pub mod commands;
mod error;
pub mod orchestrator;
pub mod server;

pub use error::PredictionError;
