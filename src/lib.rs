use log::{error, info, warn};
use wgpu::SurfaceError;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::app::{AppError, Application};
use crate::firefly::Settings;
use crate::viewer::Viewer;

pub use crate::util::vec4_to_rgba;

pub mod app;
pub mod firefly;
pub mod util;
pub mod viewer;

/// 샘플링 시드를 지정하는 환경 변수. 없으면 매 실행마다 다른 난수를 씀
pub const SEED_VAR: &str = "FIREFLY_SEED";

pub fn settings_from_env() -> Settings {
    Settings {
        seed: parse_seed(std::env::var(SEED_VAR).ok().as_deref()),
        ..Default::default()
    }
}

/// 잘못된 값은 경고만 하고 시드 없이 진행
pub fn parse_seed(value: Option<&str>) -> Option<u64> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(seed) => Some(seed),
        Err(err) => {
            warn!("ignoring {SEED_VAR}={value:?}: {err}");
            None
        }
    }
}

pub fn run() -> Result<(), AppError> {
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Firefly: Path Tracer")
        .build(&event_loop)?;

    let viewer = Viewer::new(settings_from_env());
    let mut app = pollster::block_on(Application::new(window, &event_loop, viewer))?;
    info!("window opened at {}x{}", app.size.width, app.size.height);

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == app.window.id() => {
            // egui가 먼저 처리한 입력은 무시
            if app.input(event) {
                return;
            }

            match event {
                // 만약 앱을 운영체제에서 닫으려고 하거나
                WindowEvent::CloseRequested |
                // 키보드 입력이 들어왔고
                WindowEvent::KeyboardInput {
                    input: KeyboardInput {
                        // 키보드가 새로 눌러졌으며, 그 눌러진 키가 ESC라면
                        state: ElementState::Pressed, virtual_keycode: Some(VirtualKeyCode::Escape), ..
                    }, ..
                } => *control_flow = ControlFlow::ExitWithCode(0), // 나가기

                WindowEvent::Resized(new_size) => app.resize(*new_size),
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => app.resize(**new_inner_size),
                _ => {}
            }
        }
        Event::RedrawRequested(window_id) if window_id == app.window.id() => match app.render() {
            Ok(()) => {}
            // surface를 잃어버리면 다시 설정
            Err(SurfaceError::Lost) => app.resize(app.size),
            Err(SurfaceError::OutOfMemory) => {
                error!("out of GPU memory");
                *control_flow = ControlFlow::ExitWithCode(1);
            }
            Err(err) => warn!("frame skipped: {err:?}"),
        },
        // 누적 렌더링은 계속 다시 그려야 함
        Event::MainEventsCleared => app.window.request_redraw(),
        _ => {}
    })
}
