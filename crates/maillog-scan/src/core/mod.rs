mod file_source;
mod report;
mod runner;

pub use report::render_report;
pub use runner::{ScanReport, run_scan};
