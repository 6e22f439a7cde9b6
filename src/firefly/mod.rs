use std::sync::{Arc, Mutex};

use log::{debug, trace};
use nalgebra::Vector4;
use rand::rngs::StdRng;
use rand::{thread_rng, SeedableRng};
use rayon::prelude::*;

use crate::firefly::integrator::{per_pixel, RandomSource};
use crate::firefly::output::{lock_image, Image, ImageSink, SharedImage};
use crate::firefly::scene::Scene;
use crate::vec4_to_rgba;

pub mod hit;
pub mod integrator;
pub mod output;
pub mod ray;
pub mod scene;

pub struct Settings {
    pub accumulate: bool,
    /// 있으면 (seed, 프레임 번호, 행)으로 행마다 난수 생성기를 만들어 결과를 재현 가능하게 함
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accumulate: true,
            seed: None,
        }
    }
}

/// 누적(progressive) 패스 트레이서.
///
/// `frame_index`가 1인 상태에서 `render`를 부르면 누적 버퍼를 비우고 새로 시작함.
pub struct Renderer<S: ImageSink = Image> {
    final_image: SharedImage<S>,
    final_image_data: Vec<u32>,
    path_acc: Vec<Vector4<f32>>,
    width: u32,
    height: u32,
    frame_index: u32,
    // 마지막으로 내보낸 이미지에 섞인 샘플 수
    samples: u32,
    pub settings: Settings,
}

impl Renderer<Image> {
    pub fn new() -> Self {
        Self::with_sink(Image::default())
    }
}

impl Default for Renderer<Image> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ImageSink> Renderer<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            final_image: Arc::new(Mutex::new(sink)),
            final_image_data: vec![],
            path_acc: vec![],
            width: 0,
            height: 0,
            frame_index: 1,
            samples: 0,
            settings: Default::default(),
        }
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        debug!("reallocating buffers: {}x{} -> {}x{}", self.width, self.height, width, height);

        let pixel_count = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.final_image_data = vec![0; pixel_count];
        self.path_acc = vec![Vector4::zeros(); pixel_count];
        lock_image(&self.final_image).resize(width, height);

        // 크기가 다른 예전 누적값은 절대 읽으면 안 됨
        self.frame_index = 1;
        self.samples = 0;
    }

    pub fn render(&mut self, scene: &Scene) {
        // 누적을 끈 상태로 시작하면 이전 프레임을 섞지 않음
        if !self.settings.accumulate {
            self.frame_index = 1;
        }

        trace!("rendering frame {} at {}x{}", self.frame_index, self.width, self.height);

        if self.frame_index == 1 {
            self.path_acc.fill(Vector4::zeros());
        }

        if !self.final_image_data.is_empty() {
            let (width, height) = (self.width, self.height);
            let frame_index = self.frame_index;
            let seed = self.settings.seed;

            // 각 행은 자기 슬라이스만 씀. 잠금 없이 병렬로 처리
            self.path_acc
                .par_chunks_mut(width as usize)
                .zip(self.final_image_data.par_chunks_mut(width as usize))
                .enumerate()
                .for_each(|(y, (path_row, image_row))| {
                    let row = RowTarget {
                        y: y as u32,
                        width,
                        height,
                        frame_index,
                        path_row,
                        image_row,
                    };

                    match seed {
                        Some(seed) => row.render(scene, &mut StdRng::seed_from_u64(row_seed(seed, frame_index, y))),
                        None => row.render(scene, &mut thread_rng()),
                    }
                });
        }

        // 화면 쪽에서 이미지 크기를 바꿨을 수도 있음
        let mut sink = lock_image(&self.final_image);
        sink.resize(self.width, self.height);
        sink.set_data(&self.final_image_data);
        drop(sink);
        self.samples = self.frame_index;

        if self.settings.accumulate {
            self.frame_index += 1;
        } else {
            self.frame_index = 1;
        }
    }

    pub fn reset_frame_index(&mut self) {
        self.frame_index = 1;
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// 화면에 나가 있는 이미지가 몇 프레임의 평균인지. 아직 렌더링 전이면 0
    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn final_image(&self) -> SharedImage<S> {
        Arc::clone(&self.final_image)
    }
}

struct RowTarget<'a> {
    y: u32,
    width: u32,
    height: u32,
    frame_index: u32,
    path_row: &'a mut [Vector4<f32>],
    image_row: &'a mut [u32],
}

impl RowTarget<'_> {
    fn render<R: RandomSource>(self, scene: &Scene, random: &mut R) {
        let pixels = self.path_row.iter_mut().zip(self.image_row.iter_mut());

        for (x, (path, pixel)) in pixels.enumerate() {
            let color = per_pixel(x as u32, self.y, self.width, self.height, scene, random);
            *path += color;

            let accumulated = (*path / self.frame_index as f32).map(|channel| channel.clamp(0.0, 1.0));
            *pixel = vec4_to_rgba(&accumulated);
        }
    }
}

fn row_seed(seed: u64, frame_index: u32, y: usize) -> u64 {
    seed ^ ((frame_index as u64) << 32) ^ (y as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firefly::integrator::SKY_COLOR;
    use crate::firefly::scene::{Material, Sphere};
    use nalgebra::Vector3;

    fn emissive_scene(emission: Vector3<f32>) -> Scene {
        // albedo가 검은색이라 픽셀마다 결과가 항상 같음
        Scene {
            spheres: vec![Sphere {
                position: Vector3::new(0.0, 0.0, -1.0),
                radius: 0.5,
                material: Material {
                    albedo: Vector3::zeros(),
                    emission_color: emission,
                    emission_power: 1.0,
                    ..Default::default()
                },
            }],
        }
    }

    fn noisy_scene() -> Scene {
        Scene {
            spheres: vec![
                Sphere {
                    position: Vector3::new(0.0, 0.0, -2.0),
                    radius: 0.6,
                    material: Material {
                        albedo: Vector3::new(0.9, 0.3, 0.9),
                        ..Default::default()
                    },
                },
                Sphere {
                    position: Vector3::new(0.0, -101.0, -2.0),
                    radius: 100.0,
                    material: Material {
                        albedo: Vector3::new(0.3, 0.4, 0.9),
                        ..Default::default()
                    },
                },
            ],
        }
    }

    fn seeded_renderer(width: u32, height: u32) -> Renderer {
        let mut renderer = Renderer::new();
        renderer.settings.seed = Some(1234);
        renderer.on_resize(width, height);
        renderer
    }

    fn single_sample(x: u32, y: u32, width: u32, height: u32, scene: &Scene) -> u32 {
        let mut rng = StdRng::seed_from_u64(0);
        let color = per_pixel(x, y, width, height, scene, &mut rng);
        vec4_to_rgba(&color.map(|channel| channel.clamp(0.0, 1.0)))
    }

    #[test]
    fn empty_scene_renders_sky() {
        let mut renderer = seeded_renderer(4, 3);
        renderer.render(&Scene::default());

        let sky = vec4_to_rgba(&Vector4::new(SKY_COLOR.x, SKY_COLOR.y, SKY_COLOR.z, 1.0));
        let image = renderer.final_image();
        let image = lock_image(&image);
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        assert!(image.pixels().iter().all(|&pixel| pixel == sky));
    }

    #[test]
    fn frame_index_advances_only_when_accumulating() {
        let mut renderer = seeded_renderer(2, 2);
        let scene = Scene::default();

        renderer.render(&scene);
        renderer.render(&scene);
        assert_eq!(renderer.frame_index(), 3);

        renderer.settings.accumulate = false;
        renderer.render(&scene);
        assert_eq!(renderer.frame_index(), 1);

        renderer.settings.accumulate = true;
        renderer.render(&scene);
        renderer.reset_frame_index();
        assert_eq!(renderer.frame_index(), 1);
    }

    #[test]
    fn reset_frame_shows_single_sample_only() {
        let (width, height) = (8, 8);
        let mut renderer = seeded_renderer(width, height);

        let first = emissive_scene(Vector3::new(1.0, 1.0, 1.0));
        for _ in 0..4 {
            renderer.render(&first);
        }

        let second = emissive_scene(Vector3::new(0.2, 0.4, 0.6));
        renderer.reset_frame_index();
        renderer.render(&second);

        let image = renderer.final_image();
        let image = lock_image(&image);
        for y in 0..height {
            for x in 0..width {
                let index = (x + y * width) as usize;
                assert_eq!(image.pixels()[index], single_sample(x, y, width, height, &second), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn accumulation_without_reset_mixes_frames() {
        let (width, height) = (8, 8);
        let mut renderer = seeded_renderer(width, height);

        renderer.render(&emissive_scene(Vector3::new(1.0, 1.0, 1.0)));
        renderer.render(&emissive_scene(Vector3::new(0.0, 0.0, 0.0)));

        // 가운데 픽셀은 구에 맞음: (1 + 0) / 2
        let center = (4 + 4 * width) as usize;
        let image = renderer.final_image();
        let packed = lock_image(&image).pixels()[center];
        assert_eq!(packed & 0xFF, 127);
    }

    #[test]
    fn disabling_accumulation_drops_previous_frames() {
        let (width, height) = (8, 8);
        let mut renderer = seeded_renderer(width, height);
        let lit = emissive_scene(Vector3::new(1.0, 1.0, 1.0));
        renderer.render(&lit);
        renderer.render(&lit);

        renderer.settings.accumulate = false;
        renderer.render(&emissive_scene(Vector3::new(0.0, 0.0, 0.0)));

        let center = (4 + 4 * width) as usize;
        assert_eq!(renderer.final_image_data[center] & 0xFF, 0);
        assert_eq!(renderer.frame_index(), 1);
    }

    #[test]
    fn samples_count_frames_in_displayed_image() {
        let mut renderer = seeded_renderer(2, 2);
        let scene = Scene::default();
        assert_eq!(renderer.samples(), 0);

        renderer.render(&scene);
        renderer.render(&scene);
        renderer.render(&scene);
        assert_eq!(renderer.samples(), 3);
        assert_eq!(renderer.frame_index(), 4);

        renderer.settings.accumulate = false;
        renderer.render(&scene);
        assert_eq!(renderer.samples(), 1);

        renderer.settings.accumulate = true;
        renderer.reset_frame_index();
        renderer.render(&scene);
        assert_eq!(renderer.samples(), 1);
    }

    #[test]
    fn presized_sink_is_resized_to_match() {
        let mut sink = Image::default();
        sink.resize(4, 4);
        let mut renderer = Renderer::with_sink(sink);

        renderer.on_resize(0, 0);
        renderer.render(&Scene::default());

        let image = renderer.final_image();
        let image = lock_image(&image);
        assert_eq!((image.width(), image.height()), (0, 0));
        assert!(image.pixels().is_empty());
    }

    #[test]
    fn sink_resized_from_outside_is_restored() {
        let mut renderer = seeded_renderer(2, 2);
        let handle = renderer.final_image();
        lock_image(&handle).resize(3, 3);

        renderer.render(&Scene::default());

        let image = lock_image(&handle);
        assert_eq!((image.width(), image.height()), (2, 2));
        assert_eq!(image.pixels().len(), 4);
        assert_eq!(image.generation(), 1);
    }

    #[test]
    fn resize_to_same_size_keeps_state() {
        let mut renderer = seeded_renderer(6, 4);
        let scene = noisy_scene();
        renderer.render(&scene);
        renderer.render(&scene);

        let accumulated = renderer.path_acc.clone();
        let image = renderer.final_image_data.clone();

        renderer.on_resize(6, 4);

        assert_eq!(renderer.frame_index(), 3);
        assert_eq!(renderer.path_acc, accumulated);
        assert_eq!(renderer.final_image_data, image);
    }

    #[test]
    fn resize_to_new_size_forces_reset() {
        let mut renderer = seeded_renderer(6, 4);
        let scene = emissive_scene(Vector3::new(1.0, 1.0, 1.0));
        renderer.render(&scene);
        renderer.render(&scene);

        renderer.on_resize(5, 5);
        assert_eq!(renderer.frame_index(), 1);
        assert_eq!(renderer.size(), (5, 5));
        assert_eq!(renderer.path_acc.len(), 25);
        assert_eq!(renderer.final_image_data.len(), 25);

        renderer.render(&scene);
        for y in 0..5 {
            for x in 0..5 {
                let index = (x + y * 5) as usize;
                assert_eq!(renderer.final_image_data[index], single_sample(x, y, 5, 5, &scene));
            }
        }
    }

    #[test]
    fn zero_sized_viewport_is_tolerated() {
        let mut renderer = seeded_renderer(0, 7);
        renderer.render(&noisy_scene());

        renderer.on_resize(3, 0);
        renderer.render(&noisy_scene());

        let image = renderer.final_image();
        assert!(lock_image(&image).pixels().is_empty());
        assert_eq!(renderer.frame_index(), 2);
    }

    #[test]
    fn seeded_renders_are_reproducible() {
        let scene = noisy_scene();

        let mut first = seeded_renderer(8, 8);
        let mut second = seeded_renderer(8, 8);
        for _ in 0..3 {
            first.render(&scene);
            second.render(&scene);
        }

        assert_eq!(first.final_image_data, second.final_image_data);
    }

    #[test]
    fn accumulation_converges() {
        let (width, height) = (16, 16);
        let mut renderer = seeded_renderer(width, height);
        let scene = noisy_scene();

        let mut averages: Vec<Vec<Vector4<f32>>> = vec![];
        for _ in 0..32 {
            let frame = renderer.frame_index() as f32;
            renderer.render(&scene);
            averages.push(renderer.path_acc.iter().map(|sum| sum / frame).collect());
        }

        let change = |previous: &[Vector4<f32>], current: &[Vector4<f32>]| -> f32 {
            previous.iter().zip(current).map(|(a, b)| (a - b).xyz().norm()).sum()
        };

        let early = change(&averages[0], &averages[1]);
        let late = change(&averages[30], &averages[31]);
        assert!(early > 0.0, "scene should produce noise");
        assert!(late < early, "late change {late} should be smaller than early change {early}");
    }

    #[test]
    fn final_image_is_shared() {
        let mut renderer = seeded_renderer(2, 2);
        let handle = renderer.final_image();

        renderer.render(&Scene::default());
        drop(renderer);

        let image = lock_image(&handle);
        assert_eq!(image.generation(), 1);
        assert_eq!(image.pixels().len(), 4);
    }
}
