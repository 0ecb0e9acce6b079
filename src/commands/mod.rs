pub mod clean;
pub mod decode;
pub mod encode;
pub mod helm;

pub use clean::CleanCommand;
pub use decode::{DecodeCommand, DecodeMode};
pub use encode::EncodeCommand;
pub use helm::{HelmAction, HelmCommand};
