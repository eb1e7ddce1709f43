//! Skeleton, skin mesh and animation clip import.
//!
//! A [`scene::SceneSource`] exposes a parsed interchange scene; [`convert::import_scene`]
//! turns it into an ordered armature, welded skin meshes and uniformly
//! sampled clips.

pub mod convert;
pub mod error;
pub mod logging;
pub mod math;
pub mod scene;
pub mod settings;

pub use error::{ImportError, ImportResult};
pub use logging::{ResultExt, init_logging};
