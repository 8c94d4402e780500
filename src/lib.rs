//! # Workout Deposit Bot
//!
//! A Telegram coach that holds users to their workout schedule with a
//! deposit on the line.
//!
//! ## Features
//! - Onboarding wizard: questionnaire, weekly schedule, rest interval, deposit
//! - Reminders at the start, midpoint and end of every scheduled workout
//! - Photo proof checked by a vision model (real exercise, at home)
//! - Deposit countdown, forfeiture and admin payout decisions
//! - Persistent storage with SQLite

/// Bot command handlers, wizard and message processing
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Schedule, deposit and capture window rules
pub mod domain;
/// Background services: reminders, verification, capture windows, health
pub mod services;
/// Utility functions for datetime, validation, and formatting
pub mod utils;
