//! Core of pgmap, the PostgreSQL type mapping layer.
//!
//! This crate holds the database-agnostic plumbing: the error taxonomy and the
//! checked wire-buffer extensions every codec is written against.
//!
//! Not intended to be used directly; see the `pgmap` crate.
#![forbid(unsafe_code)]
#![warn(future_incompatible, rust_2018_idioms)]

#[macro_use]
pub mod error;

pub mod ext;
pub mod io;

pub use error::{BoxDynError, DecodeError, EncodeError, Error, Result, TypeNotFoundError};
