/// Minimum voxel count to use lane-level Rayon parallelism.
pub const PARALLEL_VOXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Upsampling factor used when aligning candidates before breeding
/// (~0.01 voxel accuracy).
pub const BREED_UPSAMPLE_FACTOR: u32 = 100;

/// Width, in original pixels, of the window searched by the upsampled
/// matrix-multiply DFT around the coarse peak.
pub const UPSAMPLED_SEARCH_WINDOW: f64 = 1.5;

/// Tight support used for phase referencing and the summed-phase metric.
pub const TIGHT_SUPPORT_THRESHOLD: f64 = 0.2;
pub const TIGHT_SUPPORT_SIGMA: f64 = 0.5;

/// Loose support used for the area metric.
pub const LOOSE_SUPPORT_THRESHOLD: f64 = 0.1;
pub const LOOSE_SUPPORT_SIGMA: f64 = 1.0;

/// Coarse support used to decide conjugate-reflection ambiguity.
pub const AMBIGUITY_SUPPORT_THRESHOLD: f64 = 0.1;
pub const AMBIGUITY_SUPPORT_SIGMA: f64 = 0.1;

/// Default shrink-wrap parameters applied to bred candidates.
pub const DEFAULT_SUPPORT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_SUPPORT_SIGMA: f64 = 1.0;

/// Low-resolution sigma schedule defaults.
pub const DEFAULT_LOW_RES_SIGMA_MIN: f64 = 0.1;
pub const DEFAULT_LOW_RES_SIGMA_MAX: f64 = 2.0;
pub const DEFAULT_LOW_RES_SCALE_POWER: f64 = 1.0;

/// Sigmas at or above this value leave the data unfiltered.
pub const LOW_RES_UNFILTERED_SIGMA: f64 = 1.0;

/// Per-voxel device memory estimate for one reconstruction run, used when
/// the configuration gives no explicit footprint.
pub const RUN_BYTES_PER_VOXEL: u64 = 128;

/// Dark-field value above which a detector pixel is treated as a cosmic-ray hit.
pub const DARK_FIELD_CUTOFF: f64 = 5.0;

/// White-field value below which a detector pixel is treated as dead.
pub const WHITE_FIELD_DEAD_PIXEL: f64 = 5000.0;

/// Value substituted for dead white-field pixels so they divide to ~0.
pub const WHITE_FIELD_DEAD_VALUE: f64 = 1e20;

/// Rescale applied after white-field normalisation.
pub const WHITE_FIELD_SCALE: f64 = 1e5;

/// Default time the controller waits for in-flight runs after cancellation.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Poll interval of the dispatch loop and the process solver.
pub const DISPATCH_POLL_MILLIS: u64 = 50;

/// How long the controller waits for runs to exit after terminating them.
pub const TERMINATE_WAIT_MILLIS: u64 = 5_000;
