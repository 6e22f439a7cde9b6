use std::time::{Duration, Instant};

use eframe::egui::{self, pos2, vec2, CentralPanel, ColorImage, DragValue, Frame, Rect, ScrollArea, SidePanel, TextureHandle, TextureOptions, Ui};
use log::{error, info};
use nalgebra::Vector3;

use crate::firefly::output::lock_image;
use crate::firefly::scene::{Material, Scene, Sphere};
use crate::firefly::{Renderer, Settings};

pub const SNAPSHOT_PATH: &str = "firefly.png";

/// 장면 편집 패널과 뷰포트. 매 프레임 뷰포트 크기로 렌더러를 돌림
pub struct Viewer {
    renderer: Renderer,
    scene: Scene,
    texture: Option<TextureHandle>,
    shown_generation: u64,
    last_render_time: Duration,
}

impl Viewer {
    pub fn new(settings: Settings) -> Self {
        let mut renderer = Renderer::new();
        renderer.settings = settings;

        Self {
            renderer,
            scene: default_scene(),
            texture: None,
            shown_generation: 0,
            last_render_time: Duration::ZERO,
        }
    }

    pub fn ui(&mut self, ctx: &egui::Context) {
        // 설정을 먼저 그려야 이번 프레임 렌더링에 수정 사항이 반영됨
        SidePanel::right("Settings")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| self.settings_ui(ui));

        CentralPanel::default()
            .frame(Frame::none())
            .show(ctx, |ui| self.viewport_ui(ui));
    }

    fn settings_ui(&mut self, ui: &mut Ui) {
        ui.heading("Settings");
        ui.label(format!("Last render: {:.3}ms", self.last_render_time.as_secs_f64() * 1000.0));
        ui.label(format!("Frame: {}", self.renderer.samples()));
        ui.checkbox(&mut self.renderer.settings.accumulate, "Accumulate");

        ui.horizontal(|ui| {
            if ui.button("Reset").clicked() {
                self.renderer.reset_frame_index();
            }
            if ui.button("Save PNG").clicked() {
                self.save_snapshot();
            }
        });

        ui.separator();
        ui.heading("Scene");

        let mut changed = false;
        let mut removed = None;
        ScrollArea::vertical().show(ui, |ui| {
            for (index, sphere) in self.scene.spheres.iter_mut().enumerate() {
                ui.push_id(index, |ui| {
                    ui.collapsing(format!("Sphere {index}"), |ui| {
                        changed |= sphere_ui(ui, sphere);
                        if ui.button("Remove").clicked() {
                            removed = Some(index);
                        }
                    });
                });
            }

            if ui.button("Add sphere").clicked() {
                self.scene.spheres.push(Sphere::default());
                changed = true;
            }
        });

        if let Some(index) = removed {
            self.scene.spheres.remove(index);
            changed = true;
        }

        if changed {
            self.renderer.reset_frame_index();
        }
    }

    fn viewport_ui(&mut self, ui: &mut Ui) {
        let available = ui.available_size();
        let (width, height) = (available.x.max(0.0) as u32, available.y.max(0.0) as u32);

        let start = Instant::now();
        self.renderer.on_resize(width, height);
        self.renderer.render(&self.scene);
        self.last_render_time = start.elapsed();

        self.upload(ui.ctx());

        if let Some(texture) = &self.texture {
            // 렌더러는 +Y가 위쪽이라 세로로 뒤집어서 보여줌
            ui.add(
                egui::Image::new(texture.id(), vec2(width as f32, height as f32))
                    .uv(Rect::from_min_max(pos2(0.0, 1.0), pos2(1.0, 0.0))),
            );
        }
    }

    fn upload(&mut self, ctx: &egui::Context) {
        let image = self.renderer.final_image();
        let image = lock_image(&image);
        if image.generation() == self.shown_generation {
            return;
        }
        self.shown_generation = image.generation();

        if image.width() == 0 || image.height() == 0 {
            self.texture = None;
            return;
        }

        let color_image = ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_rgba_bytes(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, TextureOptions::NEAREST),
            None => self.texture = Some(ctx.load_texture("Firefly Output", color_image, TextureOptions::NEAREST)),
        }
    }

    fn save_snapshot(&self) {
        let image = self.renderer.final_image();
        match lock_image(&image).save_png(SNAPSHOT_PATH) {
            Ok(()) => info!("saved snapshot to {SNAPSHOT_PATH}"),
            Err(err) => error!("failed to save {SNAPSHOT_PATH}: {err}"),
        };
    }
}

fn sphere_ui(ui: &mut Ui, sphere: &mut Sphere) -> bool {
    let mut changed = drag_vec3(ui, "Position", &mut sphere.position, 0.1);
    changed |= ui
        .horizontal(|ui| {
            ui.label("Radius");
            ui.add(DragValue::new(&mut sphere.radius).speed(0.05).clamp_range(0.01..=f32::MAX)).changed()
        })
        .inner;

    let material = &mut sphere.material;
    changed |= color_edit(ui, "Albedo", &mut material.albedo);
    changed |= ui
        .horizontal(|ui| {
            ui.label("Roughness");
            ui.add(DragValue::new(&mut material.roughness).speed(0.01).clamp_range(0.0..=1.0)).changed()
        })
        .inner;
    changed |= ui
        .horizontal(|ui| {
            ui.label("Metallic");
            ui.add(DragValue::new(&mut material.metallic).speed(0.01).clamp_range(0.0..=1.0)).changed()
        })
        .inner;
    changed |= color_edit(ui, "Emission", &mut material.emission_color);
    changed |= ui
        .horizontal(|ui| {
            ui.label("Emission power");
            ui.add(DragValue::new(&mut material.emission_power).speed(0.05).clamp_range(0.0..=f32::MAX)).changed()
        })
        .inner;

    changed
}

fn drag_vec3(ui: &mut Ui, label: &str, value: &mut Vector3<f32>, speed: f32) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let mut changed = false;
        changed |= ui.add(DragValue::new(&mut value.x).speed(speed)).changed();
        changed |= ui.add(DragValue::new(&mut value.y).speed(speed)).changed();
        changed |= ui.add(DragValue::new(&mut value.z).speed(speed)).changed();
        changed
    })
    .inner
}

fn color_edit(ui: &mut Ui, label: &str, value: &mut Vector3<f32>) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let mut rgb = [value.x, value.y, value.z];
        let changed = ui.color_edit_button_rgb(&mut rgb).changed();
        if changed {
            *value = Vector3::from(rgb);
        }
        changed
    })
    .inner
}

/// 고정 카메라(0, 0, 1) 앞에 놓인 기본 장면
pub fn default_scene() -> Scene {
    Scene {
        spheres: vec![
            Sphere {
                position: Vector3::new(0.0, 0.0, -2.0),
                radius: 1.0,
                material: Material {
                    albedo: Vector3::new(1.0, 0.0, 1.0),
                    roughness: 0.0,
                    ..Default::default()
                },
            },
            Sphere {
                position: Vector3::new(2.5, 0.0, -3.0),
                radius: 1.0,
                material: Material {
                    albedo: Vector3::new(0.8, 0.5, 0.2),
                    roughness: 0.1,
                    emission_color: Vector3::new(0.8, 0.5, 0.2),
                    emission_power: 2.0,
                    ..Default::default()
                },
            },
            Sphere {
                position: Vector3::new(0.0, -101.0, -2.0),
                radius: 100.0,
                material: Material {
                    albedo: Vector3::new(0.2, 0.3, 1.0),
                    roughness: 0.1,
                    ..Default::default()
                },
            },
        ],
    }
}
