//! Scripts for deploying and initializing an upgradeable contract behind a proxy.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod calldata;
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
pub mod cli;
pub mod client;
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
pub mod commands;
pub mod constants;
pub mod deploy;
pub mod errors;
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
pub mod solidity;
pub mod types;
pub mod utils;
