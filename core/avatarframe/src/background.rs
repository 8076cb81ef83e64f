use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;

use crate::error::BackgroundRemovalError;

/// External background-removal capability (segmentation model, remote
/// service, etc.).
///
/// Implementations return a same-sized image whose alpha channel masks out
/// the background. `timeout` is the budget the pipeline grants the call; the
/// pipeline enforces it regardless of whether the implementation honors it.
///
/// Implementations must still honor `timeout` themselves. A call that
/// overruns is abandoned, not cancelled: its worker thread keeps running
/// until the call returns, so a remover that hangs leaks one thread per
/// request.
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background from `image`.
    fn remove_background(
        &self,
        image: &RgbaImage,
        timeout: Duration,
    ) -> Result<RgbaImage, BackgroundRemovalError>;
}

/// Run `remover` on a worker thread and wait at most `timeout` for it.
///
/// A worker that overruns is left to finish on its own; its result is
/// discarded.
pub(crate) fn remove_with_deadline(
    remover: &Arc<dyn BackgroundRemover>,
    image: &RgbaImage,
    timeout: Duration,
) -> Result<RgbaImage, BackgroundRemovalError> {
    let (tx, rx) = mpsc::sync_channel(1);
    let worker = Arc::clone(remover);
    let input = image.clone();

    thread::Builder::new()
        .name("avatar-background-removal".into())
        .spawn(move || {
            // Receiver may already be gone after a timeout.
            let _ = tx.send(worker.remove_background(&input, timeout));
        })
        .map_err(|e| BackgroundRemovalError::Failed(e.to_string()))?;

    let output = match rx.recv_timeout(timeout) {
        Ok(result) => result?,
        Err(RecvTimeoutError::Timeout) => return Err(BackgroundRemovalError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => return Err(BackgroundRemovalError::Disconnected),
    };

    if output.dimensions() != image.dimensions() {
        return Err(BackgroundRemovalError::Failed(format!(
            "expected {}x{} output, got {}x{}",
            image.width(),
            image.height(),
            output.width(),
            output.height()
        )));
    }

    Ok(output)
}
