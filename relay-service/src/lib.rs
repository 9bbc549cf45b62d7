//! Relay between browser clients, an object-storage bucket and an
//! asynchronous video generation API.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod services;
pub mod startup;
