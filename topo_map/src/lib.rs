//! Contour maps from tab-separated survey points.
//!
//! Points are loaded into a [`survey::PointStore`], interpolated onto a grid,
//! contoured and rendered to PNG at a chosen map scale. [`session::Session`]
//! ties the steps together.

pub mod buildings;
pub mod contour;
pub mod dtm;
pub mod error;
pub mod figure;
pub mod geometry;
pub mod i18n;
pub mod io;
pub mod params;
pub mod render;
pub mod scale;
pub mod session;
pub mod settings;
pub mod survey;

pub use error::{Result, TopoError};
pub use params::MapParams;
pub use session::{DrawnMap, Session};
