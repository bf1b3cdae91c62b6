pub mod format;
pub mod mixer;
pub mod ring_buffer;

pub use format::PcmFormat;
pub use mixer::AudioMixer;
pub use ring_buffer::PreRollBuffer;
