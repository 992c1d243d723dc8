//! Audio Engine Module
//!
//! Core audio handling shared by every effect:
//! - Audio buffer management
//! - Codec I/O
//! - The editing session (original/current buffers)

pub mod buffer;
pub mod io;
pub mod session;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{
    convert_file, decode, encode, generate_stereo_test_tone, generate_test_tone, load_file,
    save_file, ExportFormat,
};
pub use session::{HistoryEntry, Session, SessionSummary};
