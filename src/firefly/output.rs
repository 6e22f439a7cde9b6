use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytemuck::cast_slice;
use image::error::{ParameterError, ParameterErrorKind};
use image::{imageops, ImageError, ImageFormat, ImageResult, RgbaImage};

/// 완성된 픽셀을 받아 화면에 보여줄 표면.
///
/// 픽셀은 행 우선 순서이고 각 `u32`는 0xAABBGGRR.
pub trait ImageSink {
    fn resize(&mut self, width: u32, height: u32);
    fn set_data(&mut self, pixels: &[u32]);
}

/// 렌더러와 화면 쪽이 같이 들고 있는 이미지. 마지막 소유자가 놓으면 해제됨.
pub type SharedImage<S> = Arc<Mutex<S>>;

/// 이미지가 평범한 픽셀 배열이라 패닉 이후에도 내용은 유효함
pub fn lock_image<S>(image: &SharedImage<S>) -> MutexGuard<'_, S> {
    image.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    generation: u64,
}

impl Image {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// `set_data`가 불릴 때마다 증가함. 화면 쪽에서 새 프레임인지 확인할 때 사용
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 리틀 엔디언에서 0xAABBGGRR는 바이트 순서로 R, G, B, A
    pub fn as_rgba_bytes(&self) -> &[u8] {
        cast_slice(&self.pixels)
    }

    /// 렌더러의 0번 행은 화면 아래쪽이라 뒤집어서 0번 행이 위로 가게 함
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let mut image = RgbaImage::from_raw(self.width, self.height, self.as_rgba_bytes().to_vec())?;
        imageops::flip_vertical_in_place(&mut image);
        Some(image)
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        match self.to_rgba_image() {
            Some(rgba) => rgba.save_with_format(path, ImageFormat::Png),
            None => Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))),
        }
    }
}

impl ImageSink for Image {
    fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize];
    }

    fn set_data(&mut self, pixels: &[u32]) {
        assert_eq!(self.pixels.len(), pixels.len(), "pixel count does not match image size");

        self.pixels.copy_from_slice(pixels);
        self.generation += 1;
    }
}
