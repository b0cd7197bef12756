//! hlsforge-media: HLS playlist generation
//!
//! Each rendition's media playlist and segments are written by the encoder.
//! This crate renders the master playlist that ties the renditions together
//! and maps encoder profiles to RFC 6381 codec strings.

pub mod hls;

pub use hls::{codecs_for_profile, MasterPlaylist, StreamInfo};
