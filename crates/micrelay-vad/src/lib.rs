pub mod constants;
pub mod earshot;
pub mod energy;
pub mod engine;

pub use constants::{SAMPLE_RATE_HZ, WINDOW_DURATION_MS, WINDOW_SIZE_BYTES, WINDOW_SIZE_SAMPLES};
pub use earshot::{EarshotVad, Sensitivity};
pub use energy::{debiased_energy, WORKING_ENERGY_THRESHOLD};
pub use engine::VadEngine;
