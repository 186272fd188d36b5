//! Rendering of instance trajectories back into each camera's view.

use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::info;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraParameter, CameraRegistry};
use crate::candidate::{CameraId, WorldPoint};
use crate::detection::Frame;
use crate::error::{Result, ScouterError};
use crate::instance::InstanceState;

/// Pixel coordinates beyond this are not drawn.
const DRAW_LIMIT: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Cameras to render, in tile order. Empty renders every registered
    /// camera.
    pub camera_ids: Vec<CameraId>,
    pub marker_radius: u32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            camera_ids: Vec::new(),
            marker_radius: 6,
        }
    }
}

pub struct InstancesVisualizer {
    config: VisualizerConfig,
    cameras: Vec<CameraParameter>,
}

impl InstancesVisualizer {
    pub fn new(config: VisualizerConfig, registry: &CameraRegistry) -> Result<Self> {
        let ids: Vec<CameraId> = if config.camera_ids.is_empty() {
            registry.ids().collect()
        } else {
            config.camera_ids.clone()
        };

        let mut cameras: Vec<CameraParameter> = Vec::with_capacity(ids.len());
        for id in ids {
            if cameras.iter().any(|c| c.camera_id == id) {
                return Err(ScouterError::config(format!(
                    "visualizer lists camera {id} twice"
                )));
            }
            let camera = registry.get(id).map_err(|_| {
                ScouterError::config(format!("visualizer camera {id} has no camera parameter"))
            })?;
            cameras.push(camera.clone());
        }
        Ok(Self { config, cameras })
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.iter().map(|c| c.camera_id).collect()
    }

    /// Replace the calibration of a rendered camera.
    pub fn update_camera_parameter(&mut self, param: CameraParameter) -> Result<()> {
        param.validate()?;
        let slot = self
            .cameras
            .iter_mut()
            .find(|c| c.camera_id == param.camera_id)
            .ok_or(ScouterError::UnknownCamera(param.camera_id))?;
        info!("visualizer: camera {} parameter updated", param.camera_id);
        *slot = param;
        Ok(())
    }

    /// One image per camera with every instance's trajectory and current
    /// position drawn in the camera's view.
    pub fn plot_trajectories(&self, states: &[InstanceState]) -> Vec<RgbImage> {
        self.plot_trajectories_on(&[], states)
    }

    /// Like [`plot_trajectories`](Self::plot_trajectories), drawn over the
    /// given frames. Each frame is placed at its ROI offset; cameras without a
    /// frame get a black canvas.
    pub fn plot_trajectories_on(&self, frames: &[Frame], states: &[InstanceState]) -> Vec<RgbImage> {
        self.cameras
            .iter()
            .map(|camera| {
                let backdrop = frames.iter().find(|f| f.camera_id == camera.camera_id);
                self.plot_camera(camera, backdrop, states)
            })
            .collect()
    }

    fn plot_camera(
        &self,
        camera: &CameraParameter,
        backdrop: Option<&Frame>,
        states: &[InstanceState],
    ) -> RgbImage {
        let mut canvas = RgbImage::new(camera.image_width, camera.image_height);
        if let Some(frame) = backdrop {
            imageops::overlay(
                &mut canvas,
                &frame.image,
                frame.meta.offset_x as i64,
                frame.meta.offset_y as i64,
            );
        }
        let radius = self.config.marker_radius as i32;

        for state in states {
            let color = id_color(state.id);
            let points: Vec<(f32, f32)> = state
                .trajectory
                .iter()
                .filter_map(|p| to_pixel(camera, p))
                .collect();
            for pair in points.windows(2) {
                draw_line_segment_mut(&mut canvas, pair[0], pair[1], color);
            }
            if let Some((x, y)) = to_pixel(camera, &state.position) {
                draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), radius, color);
            }
        }
        canvas
    }

    /// All camera plots tiled on a square-ish grid.
    pub fn draw(&self, states: &[InstanceState]) -> RgbImage {
        tile(&self.plot_trajectories(states))
    }

    pub fn draw_on(&self, frames: &[Frame], states: &[InstanceState]) -> RgbImage {
        tile(&self.plot_trajectories_on(frames, states))
    }
}

fn to_pixel(camera: &CameraParameter, point: &WorldPoint) -> Option<(f32, f32)> {
    let (x, y) = camera.world_to_image(point)?;
    (x.abs() < DRAW_LIMIT && y.abs() < DRAW_LIMIT).then_some((x as f32, y as f32))
}

/// Distinct, stable colour for an id.
fn id_color(id: u64) -> Rgb<u8> {
    let hue = (id as f64 * 0.618_033_988_75).fract() * 6.0;
    let (s, v) = (0.85, 0.95);
    let c = v * s;
    let x = c * (1.0 - (hue % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match hue as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |f: f64| ((f + m) * 255.0).round() as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

/// Tile images on a `ceil(sqrt(n))` column grid with equal cells.
pub fn tile(images: &[RgbImage]) -> RgbImage {
    if images.is_empty() {
        return RgbImage::new(0, 0);
    }
    let cols = (images.len() as f64).sqrt().ceil() as u32;
    let rows = (images.len() as u32).div_ceil(cols);
    let cell_w = images.iter().map(|i| i.width()).max().unwrap_or(0);
    let cell_h = images.iter().map(|i| i.height()).max().unwrap_or(0);

    let mut canvas = RgbImage::new(cols * cell_w, rows * cell_h);
    for (i, img) in images.iter().enumerate() {
        let (col, row) = (i as u32 % cols, i as u32 / cols);
        imageops::overlay(
            &mut canvas,
            img,
            (col * cell_w) as i64,
            (row * cell_h) as i64,
        );
    }
    canvas
}
