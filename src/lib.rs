pub mod cli;
pub mod config;
mod error;
pub mod extract;
pub mod fetch;
pub mod index;
mod metrics;
pub mod preprocess;
pub mod scan;
pub mod search;
mod server;
pub mod utils;

pub use config::Opts;
pub use error::Error;
pub use index::GalleryIndex;
