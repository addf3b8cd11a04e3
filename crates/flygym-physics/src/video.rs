//! Animated GIF output for recorded frames.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gif::{Encoder, Frame, Repeat};
use image::RgbImage;

use crate::error::PhysicsError;

/// Frame delay in hundredths of a second for a frame rate.
///
/// GIF delays are whole centiseconds, so rates above 100 fps are clamped
/// and others rounded.
pub fn frame_delay(fps: u32) -> u16 {
    if fps == 0 {
        return 10;
    }
    (100.0 / f64::from(fps)).round().max(1.0) as u16
}

fn dim(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

/// Write `frames` to `path` as a looping GIF.
///
/// `size` is the logical screen size, used when there are no frames. The
/// trailer and buffered bytes are flushed before returning, so a failed write
/// is reported; it leaves a partial file.
pub fn write_gif(
    path: &Path,
    frames: &[RgbImage],
    size: [u32; 2],
    fps: u32,
) -> Result<(), PhysicsError> {
    let (width, height) = frames
        .first()
        .map(|f| f.dimensions())
        .unwrap_or((size[0], size[1]));

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = Encoder::new(file, dim(width), dim(height), &[])?;
    encoder.set_repeat(Repeat::Infinite)?;

    let delay = frame_delay(fps);
    for image in frames {
        let (w, h) = image.dimensions();
        let mut frame = Frame::from_rgb_speed(dim(w), dim(h), image.as_raw(), 10);
        frame.delay = delay;
        encoder.write_frame(&frame)?;
    }

    let mut file = encoder.into_inner()?;
    file.flush()?;
    Ok(())
}
