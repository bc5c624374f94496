//! Constants used throughout the detection pipeline.
//!
//! Default values for preprocessing, decoding and file locations. Every value
//! here can be overridden through `PredictorConfig`.

/// The default input shape (channels, height, width) fed to the network.
pub const DEFAULT_IMAGE_SHAPE: [usize; 3] = [3, 640, 640];

/// Per-channel mean used for normalization (ImageNet statistics, RGB order).
pub const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation used for normalization (ImageNet statistics, RGB order).
pub const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Binarization threshold applied to the probability map.
pub const DEFAULT_THRESH: f32 = 0.3;

/// Minimum mean confidence for a candidate to survive decoding.
pub const DEFAULT_BOX_THRESH: f32 = 0.5;

/// Maximum number of contours considered per image.
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Expansion factor applied when unclipping a candidate polygon.
pub const DEFAULT_UNCLIP_RATIO: f32 = 1.5;

/// Minimum short side, in map pixels, of a candidate rectangle.
pub const DEFAULT_MIN_SIZE: f32 = 3.0;

/// Confidence a detection must strictly exceed to be drawn.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// Tolerance for geometric comparisons.
pub const GEOMETRY_EPSILON: f32 = 1e-6;

/// Tolerance for score comparisons against `box_thresh`.
pub const SCORE_EPSILON: f32 = 1e-6;

/// Regions with at least this many pixels are scored with scanline parallelism.
pub const PARALLEL_SCORE_PIXEL_THRESHOLD: usize = 8_000;

/// Default directory for annotated images.
pub const DEFAULT_SAVE_DIR: &str = "outputs/prediction";

/// Default checkpoint location.
pub const DEFAULT_MODEL_PATH: &str = "checkpoints/best.safetensors";

/// Key prefix under which checkpoint parameters are stored.
pub const CHECKPOINT_KEY_PREFIX: &str = "model";

/// File extension of the precompiled inference graph.
pub const COMPILED_GRAPH_EXTENSION: &str = "onnx";
