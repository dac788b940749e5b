// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Group imports of commonly used traits and types for clients of this
//! library.
//!

pub use super::{parse, Engine, Kind, ObjectResult, Position, Query, QueryError, ResultSet, SqliteStore, Store, TraitResult, Value};
pub use super::{FieldType, Schema, TraitDef, TypeDef};

#[cfg(feature = "postgres")]
pub use super::PgStore;
