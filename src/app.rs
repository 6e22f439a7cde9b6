use std::iter;

use eframe::egui::{ClippedPrimitive, TextureId};
use thiserror::Error;
use wgpu::{Backends, Color, CommandEncoder, CommandEncoderDescriptor, CompositeAlphaMode, CreateSurfaceError, Device, DeviceDescriptor, Dx12Compiler, Features, Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue, RenderPassColorAttachment, RenderPassDescriptor, RequestAdapterOptions, RequestDeviceError, Surface, SurfaceConfiguration, SurfaceError, TextureUsages, TextureViewDescriptor};
use winit::dpi::PhysicalSize;
use winit::error::OsError;
use winit::event::WindowEvent;
use winit::event_loop::EventLoop;
use winit::window::Window;

use crate::viewer::Viewer;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create window: {0}")]
    Window(#[from] OsError),

    #[error("Failed to create surface: {0}")]
    Surface(#[from] CreateSurfaceError),

    #[error("No GPU adapter is compatible with the window surface")]
    NoAdapter,

    #[error("Surface reports no texture formats")]
    NoSurfaceFormat,

    #[error("Failed to request device: {0}")]
    Device(#[from] RequestDeviceError),
}

pub struct Application {
    surface: Surface,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    // 무조건 winit의 Window를 쓸 것!
    pub window: Window,
    egui_state: egui_winit::State,
    egui_context: eframe::egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    egui_screen: egui_wgpu::renderer::ScreenDescriptor,
    viewer: Viewer,
}

impl Application {
    pub async fn new(window: Window, event_loop: &EventLoop<()>, viewer: Viewer) -> Result<Self, AppError> {
        let size = window.inner_size();

        // instance는 Adapter와 Surface를 만들어주며 이들에 필요한 정보를 제공함.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            dx12_shader_compiler: Dx12Compiler::default(),
        });

        // 전달하는 &window가 생성하는 surface보다 오래 유지되어야 함.
        // window는 surface와 같이 Application에 저장되니 괜찮음
        let surface = unsafe { instance.create_surface(&window) }?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(AppError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    features: Features::empty(),
                    limits: Limits::default(),
                    label: Some("Firefly GPU"),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);

        // sRGB 말고 다른거 쓰면 의도한 것보다 밝기나 명도에서 차이가 날 수 있음.
        let surface_format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(AppError::NoSurfaceFormat)?;
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let mut egui_state = egui_winit::State::new(event_loop);
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_context = eframe::egui::Context::default();

        let egui_renderer = egui_wgpu::Renderer::new(
            &device,
            surface_format,
            None, // 깊이 안씀
            1 // 멀티 샘플링 1번만 할꺼임
        );
        let egui_screen = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            egui_state,
            egui_context,
            egui_renderer,
            egui_screen,
            viewer,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        // 최소화된 경우. surface 크기는 0이 될 수 없음
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        let pixels_per_point = self.window.scale_factor() as f32;
        self.egui_state.set_pixels_per_point(pixels_per_point);
        self.egui_screen.pixels_per_point = pixels_per_point;
        self.egui_screen.size_in_pixels = [self.config.width, self.config.height];
    }

    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let output = self.surface.get_current_texture()?;

        let view = output.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Encoder"),
        });

        // render_pass가 encoder를 빌려오기 때문에 아래처럼 따로 빼지 않으면 앞으로 계속 쓸 수 없음
        {
            let (primitives, freed) = self.update_egui(&mut encoder);
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.0,
                            a: 1.0
                        }),
                        store: true
                    },
                })],
                depth_stencil_attachment: None,
            });

            self.egui_renderer.render(&mut render_pass, &primitives, &self.egui_screen);
            drop(render_pass);

            // 이번 프레임을 다 그린 다음에 지워야 함
            freed.iter().for_each(|id| self.egui_renderer.free_texture(id));
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    // true: 앱에서 입력 처리를 했으니 따로 관리할 필요 없음
    // false: 아래 event loop에서 처리 해야 함.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        let egui_response = self.egui_state.on_event(&self.egui_context, event);
        egui_response.consumed
    }

    fn update_egui(&mut self, encoder: &mut CommandEncoder) -> (Vec<ClippedPrimitive>, Vec<TextureId>) {
        let egui_input = self.egui_state.take_egui_input(&self.window);
        // 패스 트레이싱은 viewer의 UI 안에서 실행됨. 뷰포트 크기를 그때 알 수 있기 때문
        let viewer = &mut self.viewer;
        let egui_output = self.egui_context.run(egui_input, |ctx| viewer.ui(ctx));

        self.egui_state.handle_platform_output(&self.window, &self.egui_context, egui_output.platform_output);
        let primitives = self.egui_context.tessellate(egui_output.shapes);
        egui_output.textures_delta.set.iter().for_each(|(id, delta)| {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        });

        self.egui_renderer.update_buffers(&self.device, &self.queue, encoder, &primitives, &self.egui_screen);

        (primitives, egui_output.textures_delta.free)
    }
}
