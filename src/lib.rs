//! hlsforge - adaptive-bitrate HLS transcoding service
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing.

pub mod config;
pub mod ladder;
pub mod server;
pub mod status;
pub mod transcode;
