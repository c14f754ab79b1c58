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

//! Bindings to the PROJ 4 (`proj_api.h`) coordinate transformation API.
//!
//! PROJ is loaded at runtime (see [`Proj4LibraryBuilder`]). Projections are
//! created from definition strings and coordinates are transformed in place,
//! in batches:
//!
//! ```no_run
//! use sedona_proj4::{transform_raw, Proj4LibraryBuilder};
//!
//! let library = Proj4LibraryBuilder::default()
//!     .with_search_paths(["/usr/share/proj"])
//!     .build()?;
//! let wgs84 = library.create("+init=epsg:4326")?;
//! let utm32 = library.create("+init=epsg:25832")?;
//!
//! let mut xs = vec![8.15_f64.to_radians()];
//! let mut ys = vec![53.2_f64.to_radians()];
//! transform_raw(&wgs84, &utm32, &mut xs, &mut ys, None)?;
//! # Ok::<(), sedona_proj4::Proj4Error>(())
//! ```

mod dyn_load;
pub mod error;
pub mod finder;
mod library;
pub mod proj_api_bindgen;
mod projection;
#[cfg(test)]
mod testing;
pub mod transform;

pub use error::{Proj4Error, Result};
pub use finder::{active_finder, Finder};
pub use library::{Proj4Library, Proj4LibraryBuilder, PROJ4_LIBRARY_ENV};
pub use projection::Projection;
pub use transform::{transform_points, transform_raw, Point, PointZ, Transformation, XYRecord};
