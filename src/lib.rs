//! Client for an asynchronous image resize pipeline
//!
//! Submits an image to object storage through a broker-issued upload URL,
//! derives where the out-of-process resize worker will write the result, and
//! polls for it with a bounded retry budget, reporting progress as one linear
//! job flow.

pub mod app;
pub mod broker;
pub mod controller;
pub mod error;
pub mod keys;
pub mod mime;
pub mod models;
pub mod poller;
pub mod storage;
pub mod transfer;

pub use error::{Error, Result};
