pub mod asset;
pub mod commands;
pub mod http;
pub mod provider;
pub mod reconcile;
pub mod runtime;
pub mod vcs;
