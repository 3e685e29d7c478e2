use image::{Rgb, RgbImage};

/// Writes a barcode-free picture, handy for checking that every stage runs
/// and the scan fails cleanly.
fn main() -> anyhow::Result<()> {
    let mut img = RgbImage::new(800, 600);
    let mut noise: u32 = 0x2545_f491;

    // Gradient with a little grain on top
    for y in 0..600 {
        for x in 0..800 {
            noise = noise.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let grain = (noise >> 28) as u8;
            let r = (x * 255 / 800) as u8;
            let g = (y * 255 / 600) as u8;
            let b = 128;
            img.put_pixel(
                x,
                y,
                Rgb([r.saturating_add(grain), g.saturating_add(grain), b + grain]),
            );
        }
    }

    img.save("test_image.png")?;
    println!("Created test_image.png (800x600 gradient, no barcode)");
    Ok(())
}
