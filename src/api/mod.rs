//! Jellyfin server API: DTOs and the HTTP client.

pub mod client;
pub mod types;

pub use client::{JellyfinClient, MediaServer};
