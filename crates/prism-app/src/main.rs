// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use clap::Parser;
use prism_core::{init_tracing, load_config};
use prism_render::{RenderSize, Renderer};
use prism_render_vk::{VkConfig, VkRenderer};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use prism_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};
use prism_platform::{drawable_size, Visibility};

mod config;

use config::{AppCfg, Overrides};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; missing means defaults
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Disable validation layers even in debug builds
    #[arg(long)]
    no_validation: bool,
    /// Give up on a fence or image acquire after this many milliseconds
    #[arg(long)]
    fence_timeout_ms: Option<u64>,
}

struct App {
    cfg: AppCfg,
    vk: VkConfig,
    window: Option<Window>,
    renderer: Option<VkRenderer>,
    visibility: Visibility,

    exiting: bool,
    failure: Option<anyhow::Error>,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    /// Tear the renderer down before the window it presents to.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.close();
        }
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.failure = Some(e);
        self.shutdown(event_loop);
    }

    fn request_redraw(&self) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let size = drawable_size(&window);
        self.visibility = Visibility::new(size);
        let init = RenderSize {
            width: size.width.max(1),
            height: size.height.max(1),
        };

        match <VkRenderer as Renderer>::new(&window, &window, init, self.vk.clone()) {
            Ok(r) => self.renderer = Some(r),
            Err(e) => return self.fail(event_loop, e),
        }
        self.window = Some(window);

        event_loop.set_control_flow(ControlFlow::Wait);
        info!("resumed, paused={}", self.visibility.is_paused());
        if !self.visibility.is_paused() {
            self.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("Escape pressed, closing");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                self.visibility.resized(size);
                if !self.visibility.is_paused() {
                    if let Some(r) = &mut self.renderer {
                        Renderer::resize(r, size);
                    }
                    self.request_redraw();
                }
            }

            WindowEvent::Occluded(occluded) => {
                if self.visibility.set_occluded(occluded) && !self.visibility.is_paused() {
                    // Surface may have changed while hidden.
                    if let Some(r) = &self.renderer {
                        Renderer::refresh(r);
                    }
                    self.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.visibility.is_paused() {
                    return;
                }
                let Some(r) = &mut self.renderer else {
                    return;
                };
                match Renderer::render_frame(r) {
                    Ok(()) => self.frames = self.frames.saturating_add(1),
                    Err(e) => self.fail(event_loop, e),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.visibility.is_paused() {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }
        self.request_redraw();

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let cfg: AppCfg = load_config(&args.config).unwrap_or_else(|e| {
        warn!("{e}; using defaults");
        AppCfg::default()
    });
    let vk = cfg.vk_config(&Overrides {
        no_validation: args.no_validation,
        fence_timeout_ms: args.fence_timeout_ms,
    });
    info!(
        validation = vk.validation,
        timeout = ?vk.fence_timeout,
        "starting {}",
        cfg.window.title
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        vk,
        window: None,
        renderer: None,
        visibility: Visibility::new(RenderSize {
            width: 0,
            height: 0,
        }),
        exiting: false,
        failure: None,
        frames: 0,
        last_fps_instant: Instant::now(),
    };
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
