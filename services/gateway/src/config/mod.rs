mod constants;
mod loader;
mod types;


pub use types::*;
