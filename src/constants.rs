//! Shared application-wide constants.
//! Centralizes tweakable values used across UI rendering, interactions and persistence.

use std::time::Duration;

// Node dimensions
/// Default node width in world units.
pub const NODE_WIDTH: f32 = 180.0;
/// Default node height in world units.
pub const NODE_HEIGHT: f32 = 110.0;
/// Height of the drag-handle header strip at the top of a node (world units).
pub const NODE_HANDLE_HEIGHT: f32 = 22.0;
/// Height of the single-line title row beneath the handle (world units).
pub const NODE_TITLE_HEIGHT: f32 = 22.0;
/// Inner horizontal padding for the text regions of a node (world units).
pub const NODE_TEXT_PADDING: f32 = 8.0;
/// Corner radius used for node rectangles (screen pixels).
pub const NODE_CORNER_RADIUS: f32 = 6.0;

// Ports
/// Radius of an input/output port dot (world units).
pub const PORT_RADIUS: f32 = 6.0;
/// Extra slack around a port dot that still counts as a hit (world units).
pub const PORT_HIT_SLOP: f32 = 4.0;

// Annotation links
/// Fraction of the chord length used to bend an annotation curve away from the straight line.
pub const ANNOTATION_CURVE_BEND: f32 = 0.2;
/// Stroke width for annotation curves (screen pixels).
pub const ANNOTATION_STROKE_WIDTH: f32 = 1.5;

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Margin (screen pixels) kept between a randomly placed node and the canvas edge.
pub const RANDOM_PLACEMENT_MARGIN: f32 = 40.0;
/// Minimum zoom factor.
pub const MIN_ZOOM: f32 = 0.25;
/// Maximum zoom factor.
pub const MAX_ZOOM: f32 = 5.0;

// Persistence
/// Quiet period after the last mutation before an autosave fires.
pub const AUTOSAVE_QUIET_PERIOD: Duration = Duration::from_millis(1000);
/// Upper bound on how long exit waits for a final save.
pub const EXIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(3);
/// Note attached to saves fired by the debounce timer.
pub const AUTOSAVE_NOTE: &str = "Auto-saved";
/// Note attached to saves triggered by the Save button.
pub const MANUAL_SAVE_NOTE: &str = "Manual save";
