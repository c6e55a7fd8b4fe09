//! Common types shared by the HRRR overlay crates and services.

pub mod cycle;
pub mod error;
pub mod extent;
pub mod variable;

pub use cycle::ForecastCycle;
pub use error::{ConfigError, ConfigResult};
pub use extent::{GeoExtent, RowSpacing, MERCATOR_MAX_LAT};
pub use variable::{
    default_variables, ColorStop, FieldSelector, PaletteSpec, UnitTransform, VariableSpec,
};
