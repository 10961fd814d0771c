//! Lodging booking server library
//!
//! Booking lifecycle engine for short-term rentals: reservation with overlap
//! protection, payment through an external provider, webhook confirmation,
//! refunds on cancellation and expiry of unpaid bookings.

pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod payments;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;
