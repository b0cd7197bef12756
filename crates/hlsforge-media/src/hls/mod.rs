//! HLS master playlist generation.

mod playlist;

pub use playlist::{codecs_for_profile, MasterPlaylist, StreamInfo, AAC_LC};
