// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use thiserror::Error;

/// Errors raised by the PROJ 4 binding layer
///
/// Native failures carry the text PROJ associates with its error code
/// (and the code itself where PROJ reports one).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Proj4Error {
    /// The shared library could not be loaded or lacks a required symbol
    #[error("PROJ library error: {0}")]
    Library(String),

    /// A native context or buffer could not be allocated
    #[error("PROJ allocation failed: {0}")]
    Allocation(String),

    /// The definition string was rejected by PROJ
    #[error("Invalid projection definition '{definition}': {message}")]
    InvalidDefinition {
        definition: String,
        code: i32,
        message: String,
    },

    /// Coordinate arrays of different lengths were passed to a transform
    #[error("Coordinate shape mismatch: {0}")]
    ShapeMismatch(String),

    /// PROJ reported an error while transforming a batch
    #[error("Transform failed: {message}")]
    Transform { code: i32, message: String },

    /// A file could not be located in any configured search path
    #[error("'{0}' was not found in any search path")]
    ResolutionMiss(String),

    /// The projection handle was already released
    #[error("Projection handle has been released")]
    Released,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Proj4Error>;
