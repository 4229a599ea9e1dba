//! boupy: tar up a folder, optionally encrypt it, and ship it to Glacier or
//! S3; or fetch a backup by URL and restore it.

extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod decryption;
pub mod download;
pub mod encryption;
pub mod error;
pub mod hash;
pub mod list;
pub mod naming;
pub mod restore;
pub mod storage;
pub mod upload_log;
pub mod utils;
