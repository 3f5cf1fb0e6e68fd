use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Backends return raw candidates in the coordinate space of the frame they
/// receive. Confidence filtering and overlap suppression are applied by
/// `Detector`, so every backend gets the same post-processing.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on a frame. Must not retain the frame beyond the call.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once at load time.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
