//! Picking ids encoded as colours.
//!
//! Each pickable object renders its unique id as an RGB colour into the pick
//! view's colour attachment. Reading the pixel under the cursor and decoding it
//! gives back the id. The pick passes clear to white, so a white pixel means
//! nothing was hit.

use cgmath::Vector3;

/// Decoded value of a pixel nothing was drawn to.
pub const NO_OBJECT: u32 = 0x00FF_FFFF;

/// Splits the low 24 bits of `id` into red (lowest byte), green and blue.
pub fn id_to_rgb(id: u32) -> [u8; 3] {
    [id as u8, (id >> 8) as u8, (id >> 16) as u8]
}

pub fn rgb_to_id(rgb: [u8; 3]) -> u32 {
    rgb[0] as u32 | (rgb[1] as u32) << 8 | (rgb[2] as u32) << 16
}

/// The id colour as the normalized vector written to the pick shaders.
pub fn id_to_colour(id: u32) -> Vector3<f32> {
    let [r, g, b] = id_to_rgb(id);
    Vector3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
}

/// The id under a read-back pixel, `None` for the cleared background.
pub fn decode_pixel(rgba: [u8; 4]) -> Option<u32> {
    match rgb_to_id([rgba[0], rgba[1], rgba[2]]) {
        NO_OBJECT => None,
        id => Some(id),
    }
}
