//! The end-to-end gridding run, owned by an explicit session object.

use image::DynamicImage;

use crate::cores::{Core, Normalization};
use crate::edits::{EditError, EditLog};
use crate::geometry::Point;
use crate::graph::{
    Calibration, OrientationResult, ProximityGraph, build_proximity_graph, calibrate, delaunay_edges,
    filter_by_length, search_orientation,
};
use crate::normalize::{align_columns, index_cores, sort_rows};
use crate::params::{Hyperparameters, SegmentationConfig};
use crate::segmentation::{MaskPredictor, SegmentationError, detect_cores};
use crate::travel::{Row, TravelError, travel};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Travel(#[from] TravelError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("no usable grid: the orientation sweep left no edge between cores")]
    NoUsableGrid,

    #[error("no cores to grid")]
    EmptyCores,
}

/// Holds the cores being gridded, their hyperparameters and every derived
/// result. Editing the cores discards the derived results.
#[derive(Debug, Clone)]
pub struct Session {
    cores: Vec<Core>,
    params: Hyperparameters,
    edits: EditLog,
    normalization: Normalization,
    points: Vec<Point>,
    orientation: Option<OrientationResult>,
    calibration: Option<Calibration>,
    graph: Option<ProximityGraph>,
    rows: Vec<Row>,
    indexed: Vec<Core>,
}

impl Session {
    pub fn new(cores: Vec<Core>, params: Hyperparameters) -> Self {
        let mut session = Self {
            cores,
            params,
            edits: EditLog::new(),
            normalization: Normalization::default(),
            points: Vec::new(),
            orientation: None,
            calibration: None,
            graph: None,
            rows: Vec::new(),
            indexed: Vec::new(),
        };
        session.reset_derived();
        session
    }

    /// Detects cores on `image` through `predictor` and opens a session on them.
    pub fn from_detection(
        image: &DynamicImage,
        predictor: &mut dyn MaskPredictor,
        segmentation: &SegmentationConfig,
        params: Hyperparameters,
    ) -> Result<Self, PipelineError> {
        let cores = detect_cores(image, predictor, segmentation)?;
        if cores.is_empty() {
            log::warn!("segmentation found no cores in a {}x{} image", image.width(), image.height());
            return Err(PipelineError::EmptyCores);
        }
        log::info!("detected {} cores", cores.len());
        Ok(Self::new(cores, params))
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    /// Replaces the hyperparameters. Derived results are kept until the next run.
    pub fn set_params(&mut self, params: Hyperparameters) {
        self.params = params;
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Core centres with the min-x/min-y offsets removed.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn orientation(&self) -> Option<&OrientationResult> {
        self.orientation.as_ref()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn graph(&self) -> Option<&ProximityGraph> {
        self.graph.as_ref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row/col-indexed cores from the last [`Session::assemble`].
    pub fn indexed_cores(&self) -> &[Core] {
        &self.indexed
    }

    fn reset_derived(&mut self) {
        self.normalization = Normalization::from_cores(&self.cores);
        self.points = self.normalization.apply(&self.cores);
        self.orientation = None;
        self.calibration = None;
        self.graph = None;
        self.rows.clear();
        self.indexed.clear();
    }

    /// Sweeps orientations, then writes the chosen angle and the derived grid
    /// width, image width and gamma back into the hyperparameters.
    pub fn calibrate(&mut self) -> Result<Calibration, PipelineError> {
        if self.points.is_empty() {
            return Err(PipelineError::EmptyCores);
        }
        let triangulation = delaunay_edges(&self.points);
        let length_filtered = filter_by_length(&triangulation, &self.points, self.params.threshold_multiplier);
        let best = search_orientation(
            &self.points,
            &length_filtered,
            self.params.min_angle,
            self.params.max_angle,
            self.params.angle_step_size,
            self.params.angle_threshold,
        );

        let calibration = calibrate(&self.points, &best, self.params.multiplier).ok_or_else(|| {
            log::warn!("orientation sweep found no real edge");
            PipelineError::NoUsableGrid
        })?;
        log::info!(
            "calibrated: angle {:.2}, grid width {:.2}, image width {:.2}, gamma {:.2}",
            calibration.origin_angle,
            calibration.grid_width,
            calibration.image_width,
            calibration.gamma
        );

        self.params.origin_angle = calibration.origin_angle;
        self.params.grid_width = calibration.grid_width;
        self.params.image_width = calibration.image_width;
        self.params.gamma = calibration.gamma;
        self.orientation = Some(best);
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    /// Builds the graph at the current hyperparameters, travels it, aligns the
    /// rows and returns the indexed cores.
    pub fn assemble(&mut self) -> Result<&[Core], PipelineError> {
        if self.points.is_empty() {
            return Err(PipelineError::EmptyCores);
        }
        let params = &self.params;
        let graph = build_proximity_graph(
            &self.points,
            params.threshold_multiplier,
            params.threshold_angle,
            params.origin_angle,
        );

        let rows = travel(&self.points, &graph.edges, params)?;
        let rows = sort_rows(rows, params.origin_angle);
        let rows = align_columns(
            rows,
            params.grid_width,
            params.origin_angle,
            params.column_threshold,
            params.max_imaginary_run,
        );
        let indexed = index_cores(&rows, &self.cores, &self.normalization);

        let placed = rows.iter().flatten().filter(|p| !p.is_imaginary && p.index.is_some()).count();
        if placed < self.cores.len() {
            log::warn!("{} of {} cores were not placed in any row", self.cores.len() - placed, self.cores.len());
        }
        log::info!(
            "assembled {} rows x {} columns ({} imaginary)",
            rows.len(),
            rows.first().map_or(0, Vec::len),
            indexed.len() - placed
        );

        self.graph = Some(graph);
        self.rows = rows;
        self.indexed = indexed;
        Ok(&self.indexed)
    }

    /// Calibrates and then assembles.
    pub fn run(&mut self) -> Result<&[Core], PipelineError> {
        self.calibrate()?;
        self.assemble()
    }

    pub fn add_core(&mut self, core: Core) -> Result<usize, PipelineError> {
        let index = self.edits.add(&mut self.cores, core)?;
        self.reset_derived();
        Ok(index)
    }

    pub fn remove_core(&mut self, index: usize) -> Result<Core, PipelineError> {
        let core = self.edits.remove(&mut self.cores, index)?;
        self.reset_derived();
        Ok(core)
    }

    pub fn undo(&mut self) -> Result<bool, PipelineError> {
        let changed = self.edits.undo(&mut self.cores)?;
        if changed {
            self.reset_derived();
        }
        Ok(changed)
    }

    pub fn redo(&mut self) -> Result<bool, PipelineError> {
        let changed = self.edits.redo(&mut self.cores)?;
        if changed {
            self.reset_derived();
        }
        Ok(changed)
    }

    pub fn edit_log(&self) -> &EditLog {
        &self.edits
    }
}
