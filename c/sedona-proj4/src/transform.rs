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

//! Batch coordinate transformation between two [`Projection`]s.
//!
//! Coordinates are transformed in place with a single `pj_transform` call
//! per batch. Angular coordinates are in radians on both sides; no unit
//! conversion happens here.
//!
//! When PROJ reports an error the whole call fails, but PROJ may already
//! have overwritten some leading coordinates. Buffers should be considered
//! indeterminate after an error.

use std::mem::{offset_of, size_of};
use std::os::raw::{c_int, c_long};
use std::ptr;
use std::sync::Arc;

use crate::error::{Proj4Error, Result};
use crate::library::proj_fn;
use crate::projection::Projection;

/// A packed record holding `f64` x and y fields
///
/// # Safety
///
/// Implementors must have a stable layout (`#[repr(C)]` or an array) whose
/// size is a multiple of `size_of::<f64>()`, with `X_OFFSET` and `Y_OFFSET`
/// being the byte offsets of properly aligned `f64` fields.
pub unsafe trait XYRecord {
    const X_OFFSET: usize;
    const Y_OFFSET: usize;
}

/// A two dimensional point
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

unsafe impl XYRecord for Point {
    const X_OFFSET: usize = offset_of!(Point, x);
    const Y_OFFSET: usize = offset_of!(Point, y);
}

impl From<geo_types::Coord<f64>> for Point {
    fn from(coord: geo_types::Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl From<Point> for geo_types::Coord<f64> {
    fn from(point: Point) -> Self {
        geo_types::coord! { x: point.x, y: point.y }
    }
}

/// A point with an elevation that [`transform_points`] leaves untouched
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PointZ {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

unsafe impl XYRecord for PointZ {
    const X_OFFSET: usize = offset_of!(PointZ, x);
    const Y_OFFSET: usize = offset_of!(PointZ, y);
}

unsafe impl XYRecord for [f64; 2] {
    const X_OFFSET: usize = 0;
    const Y_OFFSET: usize = size_of::<f64>();
}

unsafe impl XYRecord for [f64; 3] {
    const X_OFFSET: usize = 0;
    const Y_OFFSET: usize = size_of::<f64>();
}

/// Transform parallel coordinate arrays in place
///
/// `zs`, when given, must have the same length as `xs` and `ys`. Length
/// mismatches are rejected without calling PROJ; empty input succeeds
/// without calling PROJ.
pub fn transform_raw(
    src: &Projection,
    dst: &Projection,
    xs: &mut [f64],
    ys: &mut [f64],
    zs: Option<&mut [f64]>,
) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(Proj4Error::ShapeMismatch(format!(
            "x has {} coordinates but y has {}",
            xs.len(),
            ys.len()
        )));
    }

    if let Some(zs) = &zs {
        if zs.len() != xs.len() {
            return Err(Proj4Error::ShapeMismatch(format!(
                "x has {} coordinates but z has {}",
                xs.len(),
                zs.len()
            )));
        }
    }

    let z = zs.map(|zs| zs.as_mut_ptr()).unwrap_or(ptr::null_mut());
    unsafe { transform_strided(src, dst, xs.len(), 1, xs.as_mut_ptr(), ys.as_mut_ptr(), z) }
}

/// Transform the x and y fields of packed records in place
///
/// PROJ walks the slice directly using the record size as stride, so no
/// intermediate buffers are allocated. Other fields are not modified.
pub fn transform_points<P: XYRecord>(
    src: &Projection,
    dst: &Projection,
    points: &mut [P],
) -> Result<()> {
    let record_size = size_of::<P>();
    if record_size == 0 || record_size % size_of::<f64>() != 0 {
        return Err(Proj4Error::InvalidArgument(format!(
            "Point records of {record_size} bytes are not a whole number of f64 values"
        )));
    }

    let stride = record_size / size_of::<f64>();
    let base = points.as_mut_ptr() as *mut u8;

    // The offsets are only applied to a non-empty slice so the pointers never
    // leave the allocation.
    let (x, y) = if points.is_empty() {
        (ptr::null_mut(), ptr::null_mut())
    } else {
        unsafe {
            (
                base.add(P::X_OFFSET) as *mut f64,
                base.add(P::Y_OFFSET) as *mut f64,
            )
        }
    };

    unsafe { transform_strided(src, dst, points.len(), stride, x, y, ptr::null_mut()) }
}

/// # Safety
///
/// Unless `count` is zero, `x` and `y` (and `z` when non-null) must address
/// `count` writable `f64` values spaced `stride` values apart.
unsafe fn transform_strided(
    src: &Projection,
    dst: &Projection,
    count: usize,
    stride: usize,
    x: *mut f64,
    y: *mut f64,
    z: *mut f64,
) -> Result<()> {
    let src_pj = src.live_pj()?;
    let dst_pj = dst.live_pj()?;

    if !Arc::ptr_eq(src.library(), dst.library()) {
        return Err(Proj4Error::InvalidArgument(
            "Source and destination projections were created from different PROJ libraries"
                .to_string(),
        ));
    }

    if count == 0 {
        return Ok(());
    }

    let point_count = c_long::try_from(count).map_err(|_| {
        Proj4Error::InvalidArgument(format!("{count} coordinates exceed the PROJ batch limit"))
    })?;
    let point_offset = c_int::try_from(stride).map_err(|_| {
        Proj4Error::InvalidArgument(format!("Stride of {stride} exceeds the PROJ limit"))
    })?;

    let library = src.library();
    let pj_transform = proj_fn!(library.api(), pj_transform);
    let code = unsafe { pj_transform(src_pj, dst_pj, point_count, point_offset, x, y, z) };
    if code != 0 {
        let message = library.error_message(code);
        log::debug!("pj_transform failed for {count} coordinates: {message} ({code})");
        return Err(Proj4Error::Transform { code, message });
    }

    Ok(())
}

/// A fixed pairing of source and destination projections
#[derive(Debug, Clone, Copy)]
pub struct Transformation<'a> {
    src: &'a Projection,
    dst: &'a Projection,
}

impl<'a> Transformation<'a> {
    pub fn new(src: &'a Projection, dst: &'a Projection) -> Self {
        Self { src, dst }
    }

    pub fn source(&self) -> &'a Projection {
        self.src
    }

    pub fn destination(&self) -> &'a Projection {
        self.dst
    }

    /// The same pairing in the opposite direction
    pub fn inverse(&self) -> Self {
        Self::new(self.dst, self.src)
    }

    /// See [`transform_raw`]
    pub fn transform_raw(
        &self,
        xs: &mut [f64],
        ys: &mut [f64],
        zs: Option<&mut [f64]>,
    ) -> Result<()> {
        transform_raw(self.src, self.dst, xs, ys, zs)
    }

    /// See [`transform_points`]
    pub fn transform_points<P: XYRecord>(&self, points: &mut [P]) -> Result<()> {
        transform_points(self.src, self.dst, points)
    }
}
