//! Genius API integration
//!
//! Song search goes through the authenticated JSON API; lyrics and full-size
//! cover art come from the public song page, since the API does not expose
//! lyrics.
//!
//! API docs: https://docs.genius.com

pub mod dto;
mod adapter;
mod client;

pub use adapter::{extract_cover_art, extract_lyrics, to_candidates};
pub use client::GeniusClient;
