mod api;
pub mod path;

pub use api::PathParser;
pub use path::{join_path, ClassPath};
