/// A trait for voice activity detection engines.
///
/// Implementations classify fixed-size windows of 16-bit mono audio at the
/// analysis rate, allowing engines to be swapped without touching the
/// summarizer.
pub trait VadEngine: Send {
    /// Classify one complete window. `window` must hold exactly
    /// `required_window_samples()` samples at `required_sample_rate()`.
    fn is_speech(&mut self, window: &[i16]) -> Result<bool, String>;
    fn reset(&mut self);
    fn required_sample_rate(&self) -> u32;
    fn required_window_samples(&self) -> usize;
}
