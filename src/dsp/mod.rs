//! DSP core: automation, sound graphs and the block renderer.
//!
//! Everything here is plain Rust with no device dependency, so the same
//! code renders through `cpal`, in a browser via WASM, or offline to WAV.

pub mod compressor;
pub mod engine;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod param;
pub mod renderer;
pub mod reverb;
pub mod sampler;
pub mod sound;
