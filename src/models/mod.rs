//! Core data models for the audio hosting service.
//!
//! Records serialize with the camelCase keys the dashboard and the legacy
//! `audio-metadata.json` files use.

pub mod audio;
pub mod stats;
