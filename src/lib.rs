//! Interactive 3D surface plots for iced.
//!
//! A [`SurfacePlot`] turns a [`SampleGrid`] into a rotatable surface, drawn
//! either on a `canvas` with the painter's algorithm or through a wgpu
//! `shader` widget with depth testing and lighting.

pub mod canvas;
pub mod capability;
pub mod colormap;
pub mod error;
pub mod geometry;
pub mod gpu_types;
pub mod grid;
pub mod hardware;
pub mod hover;
pub mod interaction;
pub mod label;
pub mod link;
pub mod math;
pub mod pipeline;
pub mod plotter;
pub mod shader;
pub mod software;
pub mod ticks;

pub use capability::{Backend, BackendPreference, Capability};
pub use colormap::{ColorGradient, ColormapName, Rgb};
pub use error::{PlotError, Result};
pub use grid::SampleGrid;
pub use link::LinkGroup;
pub use plotter::{HardwareOptions, SurfacePlot, SurfacePlotOptions, SurfaceRenderer};
