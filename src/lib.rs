pub mod config;
pub mod engine;
pub mod expand;
pub mod fetch;
pub mod humanize;
pub mod manifest;
pub mod observability;
pub mod request;
pub mod resolve;
pub mod staging;

#[cfg(test)]
mod test_support;
