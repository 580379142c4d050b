pub mod probe;

pub use probe::{HttpProber, ProbeOutcome, Prober};
