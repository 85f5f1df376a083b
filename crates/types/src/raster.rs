/// An in-memory RGBA raster, straight (non-premultiplied) alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { width, height, rgba })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }

    /// Copies a sub-rectangle. Returns `None` when it falls outside the image.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Option<RasterImage> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }
        let stride = self.width as usize * 4;
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..y + height {
            let start = row as usize * stride + x as usize * 4;
            rgba.extend_from_slice(&self.rgba[start..start + width as usize * 4]);
        }
        Some(RasterImage { width, height, rgba })
    }

    /// Flattens onto white and drops the alpha channel.
    pub fn to_rgb_on_white(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.rgba.chunks_exact(4) {
            let a = px[3] as u32;
            for &c in &px[..3] {
                rgb.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
            }
        }
        rgb
    }
}
