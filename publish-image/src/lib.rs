pub(crate) mod broker;
pub(crate) mod builder;
pub(crate) mod classify;
pub(crate) mod docker;
pub(crate) mod error;
pub(crate) mod image_ref;
pub(crate) mod output;
pub(crate) mod pipeline;
pub(crate) mod process;
pub(crate) mod publisher;
pub(crate) mod registry;
pub(crate) mod report;
pub(crate) mod request;
pub(crate) mod temp_path;
pub(crate) mod version;

#[cfg(test)]
mod fakes;

pub mod cli;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;
