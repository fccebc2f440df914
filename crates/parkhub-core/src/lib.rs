//! Parkhub Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Parkhub reservation system. It includes:
//!
//! - Domain models (Slot, Booking, Actor)
//! - Store and payment-gateway traits
//! - Unified error handling with HTTP response mapping
//! - Application configuration
//! - The pure hold-expiry policy

pub mod config;
pub mod error;
pub mod expiry;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
