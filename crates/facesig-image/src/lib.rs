//! facesig-image — Turns image files into pixel buffers for the blur gate.
//!
//! Decodes with a bounded working size, applies the EXIF orientation tag,
//! and rescales. Nothing here is numeric post-processing; see `facesig-core`.

pub mod loader;
pub mod transform;

pub use loader::{load_capped, load_oriented, FileSource, ImageSource, LoadError};
pub use transform::{apply_orientation, resize};
