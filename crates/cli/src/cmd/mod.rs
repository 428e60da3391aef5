mod build;
mod normalize;
mod tablegen;

pub use build::{BuildArgs, cmd_build};
pub use normalize::cmd_normalize_json;
pub use tablegen::cmd_tablegen;
