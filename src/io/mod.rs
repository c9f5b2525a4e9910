//! I/O modules for reading instrument logs, calibrations, and sensor
//! response functions, and for writing the terminal tables

pub mod calibration;
pub mod export;
pub mod log_reader;
pub mod raster;
pub mod srf;

pub use calibration::load_wavelength_map;
pub use log_reader::{LogFormat, LogReader};
pub use raster::ReflectanceSampler;
pub use srf::{load_sensor_response, resample_response};
