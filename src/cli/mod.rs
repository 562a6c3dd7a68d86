mod build;
mod export;
mod fetch;
mod search;
mod server;

pub use build::*;
pub use export::*;
pub use fetch::*;
pub use search::*;
pub use server::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
