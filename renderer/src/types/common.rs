//! Common types shared across the renderer.

use super::TextureFormat;

/// 3D extent for textures and buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

/// Clear value for color images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearColorValue {
    /// Float (and normalized) formats.
    Float([f32; 4]),
    /// Unsigned integer formats.
    Uint([u32; 4]),
}

impl Default for ClearColorValue {
    fn default() -> Self {
        Self::Float([0.0; 4])
    }
}

impl ClearColorValue {
    /// Create a float color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Float([r, g, b, a])
    }

    fn as_float(&self) -> [f32; 4] {
        match *self {
            Self::Float(v) => v,
            Self::Uint(v) => v.map(|c| c as f32),
        }
    }

    fn as_uint(&self) -> [u32; 4] {
        match *self {
            Self::Float(v) => v.map(|c| c.max(0.0) as u32),
            Self::Uint(v) => v,
        }
    }

    /// Encode one texel of this color in the memory layout of `format`.
    ///
    /// Used when images are cleared by CPU-filling a staging buffer instead
    /// of a hardware clear. The result is exactly `format.block_size()` bytes.
    pub fn encode_texel(&self, format: TextureFormat) -> Vec<u8> {
        let unorm = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        let f = self.as_float();
        let u = self.as_uint();
        match format {
            TextureFormat::R8Unorm => vec![unorm(f[0])],
            TextureFormat::R8Uint => vec![u[0].min(u32::from(u8::MAX)) as u8],
            TextureFormat::Rg8Unorm => vec![unorm(f[0]), unorm(f[1])],
            TextureFormat::R16Float => bytemuck::bytes_of(&f32_to_f16_bits(f[0])).to_vec(),
            TextureFormat::R32Float | TextureFormat::Depth32Float => {
                bytemuck::bytes_of(&f[0]).to_vec()
            }
            TextureFormat::R32Uint => bytemuck::bytes_of(&u[0]).to_vec(),
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => f.map(unorm).to_vec(),
            TextureFormat::Bgra8Unorm => vec![unorm(f[2]), unorm(f[1]), unorm(f[0]), unorm(f[3])],
            TextureFormat::Rgba16Float => {
                bytemuck::cast_slice::<u16, u8>(&f.map(f32_to_f16_bits)).to_vec()
            }
            TextureFormat::Rgba32Float => bytemuck::cast_slice::<f32, u8>(&f).to_vec(),
            TextureFormat::Rgba32Uint => bytemuck::cast_slice::<u32, u8>(&u).to_vec(),
        }
    }
}

/// Round-toward-zero conversion to IEEE half precision bits.
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        // inf / nan
        let nan = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let half_exponent = exponent - 127 + 15;
    if half_exponent >= 0x1f {
        return sign | 0x7c00;
    }
    if half_exponent <= 0 {
        if half_exponent < -10 {
            return sign;
        }
        let mantissa = mantissa | 0x0080_0000;
        return sign | (mantissa >> (14 - half_exponent)) as u16;
    }
    sign | ((half_exponent as u16) << 10) | (mantissa >> 13) as u16
}
