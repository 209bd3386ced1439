pub mod results;
pub mod scan;
pub mod volume;

pub use results::{load_population, read_summary, DirectorySink, FitnessSummary, ResultSink};
pub use volume::{
    read_complex_volume, read_real_volume, read_trace, write_complex_volume, write_real_volume,
    write_trace, VolumeHeader, VolumeKind, VolumeReader,
};
