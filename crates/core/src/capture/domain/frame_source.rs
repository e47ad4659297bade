use crate::shared::encoded_image::EncodedImage;

/// Supplies still frames from the user-facing camera on demand.
///
/// `None` means the source is not ready yet (camera warming up, snapshot
/// not written); it is not an error and the caller just skips the cycle.
pub trait FrameSource: Send {
    fn capture_frame(&mut self) -> Option<EncodedImage>;
}
