//! Hyperparameters, segmentation settings and the params file that carries them.

use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_THRESHOLD_ANGLE: f64 = 10.0;
pub const DEFAULT_RADIUS_MULTIPLIER: f64 = 0.7;
pub const DEFAULT_ANGLE_STEP_SIZE: f64 = 5.0;
pub const DEFAULT_ANGLE_THRESHOLD: f64 = 20.0;
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_SEARCH_ANGLE: f64 = 360.0;
pub const DEFAULT_GAMMA: f64 = 60.0;
pub const DEFAULT_GRID_WIDTH: f64 = 70.0;
pub const DEFAULT_IMAGE_WIDTH: f64 = 1024.0;
pub const DEFAULT_COLUMN_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MATCH_EPSILON: f64 = 0.1;
pub const DEFAULT_MAX_IMAGINARY_RUN: usize = 50;

/// Fraction of the grid width used as the right-edge tolerance after calibration.
pub const GAMMA_FRACTION: f64 = 0.9;

/// Knobs for graph building, orientation search, traveling and row normalisation.
///
/// Serialised with the camelCase names the browser form used, so a saved params
/// file can be fed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hyperparameters {
    pub threshold_multiplier: f64,
    pub threshold_angle: f64,
    pub origin_angle: f64,
    pub radius_multiplier: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    pub angle_step_size: f64,
    pub angle_threshold: f64,
    pub multiplier: f64,
    /// Sector width for the neighbour search. Kept for file compatibility; the
    /// search is radius-only.
    pub search_angle: f64,
    pub gamma: f64,
    pub grid_width: f64,
    pub image_width: f64,
    pub column_threshold: f64,
    pub match_epsilon: f64,
    pub max_imaginary_run: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            threshold_angle: DEFAULT_THRESHOLD_ANGLE,
            origin_angle: 0.0,
            radius_multiplier: DEFAULT_RADIUS_MULTIPLIER,
            min_angle: 0.0,
            max_angle: 360.0,
            angle_step_size: DEFAULT_ANGLE_STEP_SIZE,
            angle_threshold: DEFAULT_ANGLE_THRESHOLD,
            multiplier: DEFAULT_MULTIPLIER,
            search_angle: DEFAULT_SEARCH_ANGLE,
            gamma: DEFAULT_GAMMA,
            grid_width: DEFAULT_GRID_WIDTH,
            image_width: DEFAULT_IMAGE_WIDTH,
            column_threshold: DEFAULT_COLUMN_THRESHOLD,
            match_epsilon: DEFAULT_MATCH_EPSILON,
            max_imaginary_run: DEFAULT_MAX_IMAGINARY_RUN,
        }
    }
}

impl Hyperparameters {
    pub fn with_threshold_multiplier(mut self, value: f64) -> Self {
        self.threshold_multiplier = value;
        self
    }

    pub fn with_threshold_angle(mut self, value: f64) -> Self {
        self.threshold_angle = value;
        self
    }

    pub fn with_origin_angle(mut self, value: f64) -> Self {
        self.origin_angle = value;
        self
    }

    pub fn with_radius_multiplier(mut self, value: f64) -> Self {
        self.radius_multiplier = value;
        self
    }

    pub fn with_angle_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min_angle = min;
        self.max_angle = max;
        self.angle_step_size = step;
        self
    }

    pub fn with_angle_threshold(mut self, value: f64) -> Self {
        self.angle_threshold = value;
        self
    }

    pub fn with_grid(mut self, grid_width: f64, image_width: f64, gamma: f64) -> Self {
        self.grid_width = grid_width;
        self.image_width = image_width;
        self.gamma = gamma;
        self
    }

    pub fn with_max_imaginary_run(mut self, value: usize) -> Self {
        self.max_imaginary_run = value;
        self
    }

    /// Search radius used by the traveling algorithm when no vector starts
    /// exactly at the frontier.
    pub fn search_radius(&self) -> f64 {
        self.radius_multiplier * self.grid_width
    }
}

pub const DEFAULT_MIN_AREA: usize = 100;
pub const DEFAULT_MAX_AREA: usize = 20_000;
pub const DEFAULT_DISTANCE_TRANSFORM_MULTIPLIER: f64 = 0.6;
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;
pub const DEFAULT_PEAK_PROMINENCE: f64 = 2.0;
pub const DEFAULT_INPUT_SIZE: u32 = 512;

/// Parameters of mask segmentation and region filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentationConfig {
    pub min_area: usize,
    pub max_area: usize,
    pub distance_transform_multiplier: f64,
    /// Probability cut applied to predictor output (`p >= threshold` is foreground).
    pub mask_threshold: f32,
    /// Minimum height, in pixels of distance, a distance-transform peak must rise
    /// above the saddle joining it to a taller peak to seed its own region.
    pub peak_prominence: f64,
    /// Grow markers over the unknown band. When false, centroids come from the
    /// sure-foreground markers alone.
    pub watershed: bool,
    pub input_size: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            max_area: DEFAULT_MAX_AREA,
            distance_transform_multiplier: DEFAULT_DISTANCE_TRANSFORM_MULTIPLIER,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            peak_prominence: DEFAULT_PEAK_PROMINENCE,
            watershed: true,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl SegmentationConfig {
    pub fn with_area_range(mut self, min_area: usize, max_area: usize) -> Self {
        self.min_area = min_area;
        self.max_area = max_area;
        self
    }

    pub fn with_distance_transform_multiplier(mut self, value: f64) -> Self {
        self.distance_transform_multiplier = value;
        self
    }

    pub fn with_peak_prominence(mut self, value: f64) -> Self {
        self.peak_prominence = value;
        self
    }

    pub fn with_watershed(mut self, enabled: bool) -> Self {
        self.watershed = enabled;
        self
    }

    pub fn with_mask_threshold(mut self, value: f32) -> Self {
        self.mask_threshold = value;
        self
    }
}

pub const DEFAULT_VIRTUAL_SPACING: u32 = 100;
pub const DEFAULT_VIRTUAL_START: u32 = 50;
pub const DEFAULT_VIRTUAL_RADIUS: u32 = 45;

/// Placement of the de-arrayed virtual grid: where each cell goes and how much
/// of the slide around every core is cut out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualGridLayout {
    pub horizontal_spacing: u32,
    pub vertical_spacing: u32,
    pub start_x: u32,
    pub start_y: u32,
    /// Radius of the disc cut out around each core.
    pub radius: u32,
    /// Shift applied to core positions before cutting, for masks that are
    /// offset from the slide.
    pub x_offset: i32,
    pub y_offset: i32,
}

impl Default for VirtualGridLayout {
    fn default() -> Self {
        Self {
            horizontal_spacing: DEFAULT_VIRTUAL_SPACING,
            vertical_spacing: DEFAULT_VIRTUAL_SPACING,
            start_x: DEFAULT_VIRTUAL_START,
            start_y: DEFAULT_VIRTUAL_START,
            radius: DEFAULT_VIRTUAL_RADIUS,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl VirtualGridLayout {
    pub fn with_spacing(mut self, horizontal: u32, vertical: u32) -> Self {
        self.horizontal_spacing = horizontal;
        self.vertical_spacing = vertical;
        self
    }

    pub fn with_start(mut self, x: u32, y: u32) -> Self {
        self.start_x = x;
        self.start_y = y;
        self
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.x_offset = x;
        self.y_offset = y;
        self
    }
}

/// Combined params file accepted by the command-line tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamsFile {
    #[serde(flatten)]
    pub hyperparameters: Hyperparameters,
    pub segmentation: SegmentationConfig,
    pub virtual_grid: VirtualGridLayout,
}
