//! Headless capture: PNG screenshots.

use std::error::Error;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use emu_core::Cpu;

use crate::scheduler::Scheduler;
use crate::video::Frame;

/// Save the last rendered frame as a PNG file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_screenshot<C: Cpu>(machine: &Scheduler<C>, path: &Path) -> Result<(), Box<dyn Error>> {
    let frame = machine.bus().devices.video.frame();
    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&to_rgba(&frame))?;
    Ok(())
}

/// XRGB8888 rows (honouring the pitch) to packed RGBA bytes.
fn to_rgba(frame: &Frame<'_>) -> Vec<u8> {
    let width = frame.width as usize;
    let stride = frame.pitch / 4;
    let mut rgba = Vec::with_capacity(width * frame.height as usize * 4);
    let rows = frame.pixels.chunks(stride.max(1)).take(frame.height as usize);
    // A truncated buffer ends the image early.
    for row in rows.map_while(|row| row.get(..width)) {
        for &pixel in row {
            rgba.extend_from_slice(&[(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8, 0xFF]);
        }
    }
    rgba
}
