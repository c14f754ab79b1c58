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
use std::ffi::{CStr, CString};
use std::fmt::Debug;
use std::os::raw::c_void;
use std::ptr;
use std::sync::Arc;

use crate::error::{Proj4Error, Result};
use crate::library::{proj_fn, Proj4Library};
use crate::proj_api_bindgen::{projCtx, projPJ};

/// A coordinate reference system initialised from a PROJ definition string
///
/// Owns a dedicated PROJ context together with the projection object created
/// in it. Both are freed by [`Projection::release`] or, at the latest, when
/// the value is dropped. A handle may be moved to another thread but must not
/// be used from several threads at once.
pub struct Projection {
    library: Arc<Proj4Library>,
    ctx: projCtx,
    pj: projPJ,
}

// The context is private to this handle, so moving it across threads is
// sound. Concurrent access is not, hence no Sync.
unsafe impl Send for Projection {}

impl Projection {
    /// Initialise a projection from a definition such as
    /// `"+proj=utm +zone=32 +ellps=GRS80 +units=m +no_defs"` or
    /// `"+init=epsg:4326"`
    ///
    /// PROJ may call the registered [`Finder`](crate::Finder) while parsing
    /// the definition. No native resources are retained on failure.
    pub fn try_new(library: &Arc<Proj4Library>, definition: &str) -> Result<Self> {
        let api = library.api();
        let ctx_alloc = proj_fn!(api, pj_ctx_alloc);
        let ctx_free = proj_fn!(api, pj_ctx_free);
        let ctx_get_errno = proj_fn!(api, pj_ctx_get_errno);
        let init_plus_ctx = proj_fn!(api, pj_init_plus_ctx);

        let c_definition = CString::new(definition).map_err(|e| Proj4Error::InvalidDefinition {
            definition: definition.to_string(),
            code: 0,
            message: format!("definition contains a nul byte at {}", e.nul_position()),
        })?;

        let ctx = unsafe { ctx_alloc() };
        if ctx.is_null() {
            return Err(Proj4Error::Allocation(Self::global_error_message(library)));
        }

        let pj = unsafe { init_plus_ctx(ctx, c_definition.as_ptr()) };
        if pj.is_null() {
            let code = unsafe { ctx_get_errno(ctx) };
            unsafe { ctx_free(ctx) };
            let message = library.error_message(code);
            log::debug!("PROJ rejected '{definition}': {message} ({code})");
            return Err(Proj4Error::InvalidDefinition {
                definition: definition.to_string(),
                code,
                message,
            });
        }

        Ok(Self {
            library: library.clone(),
            ctx,
            pj,
        })
    }

    /// Message for a failure that happened before any context existed
    fn global_error_message(library: &Proj4Library) -> String {
        let errno_ref = library
            .api()
            .pj_get_errno_ref
            .map(|get_errno_ref| unsafe { get_errno_ref() })
            .unwrap_or(ptr::null_mut());

        if errno_ref.is_null() {
            "unknown error on pj_ctx_alloc".to_string()
        } else {
            library.error_message(unsafe { *errno_ref })
        }
    }

    pub fn library(&self) -> &Arc<Proj4Library> {
        &self.library
    }

    /// Whether coordinates are angular (longitude/latitude in radians)
    pub fn is_geographic(&self) -> Result<bool> {
        let is_latlong = proj_fn!(self.library.api(), pj_is_latlong);
        let pj = self.live_pj()?;
        Ok(unsafe { is_latlong(pj) } != 0)
    }

    /// Whether coordinates are earth-centred cartesian
    pub fn is_geocentric(&self) -> Result<bool> {
        let is_geocent = proj_fn!(self.library.api(), pj_is_geocent);
        let pj = self.live_pj()?;
        Ok(unsafe { is_geocent(pj) } != 0)
    }

    /// The expanded definition string as normalised by PROJ, suitable as
    /// input to [`Projection::try_new`]
    pub fn definition(&self) -> Result<String> {
        let get_def = proj_fn!(self.library.api(), pj_get_def);
        let dalloc = proj_fn!(self.library.api(), pj_dalloc);
        let pj = self.live_pj()?;

        let raw = unsafe { get_def(pj, 0) };
        if raw.is_null() {
            return Err(Proj4Error::Allocation(
                "pj_get_def returned no definition".to_string(),
            ));
        }

        let definition = unsafe { CStr::from_ptr(raw) }
            .to_string_lossy()
            .trim()
            .to_string();
        unsafe { dalloc(raw as *mut c_void) };
        Ok(definition)
    }

    /// Free the projection and its context. Calling this more than once is
    /// harmless; afterwards every other operation fails with
    /// [`Proj4Error::Released`].
    pub fn release(&mut self) {
        let api = self.library.api();

        if !self.pj.is_null() {
            if let Some(free) = api.pj_free {
                unsafe { free(self.pj) };
            }
            self.pj = ptr::null_mut();
        }

        if !self.ctx.is_null() {
            if let Some(ctx_free) = api.pj_ctx_free {
                unsafe { ctx_free(self.ctx) };
            }
            self.ctx = ptr::null_mut();
        }
    }

    pub fn is_released(&self) -> bool {
        self.pj.is_null()
    }

    pub(crate) fn live_pj(&self) -> Result<projPJ> {
        if self.pj.is_null() {
            Err(Proj4Error::Released)
        } else {
            Ok(self.pj)
        }
    }
}

impl Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Projection {
    fn drop(&mut self) {
        if !self.is_released() {
            log::trace!("Releasing PROJ handle on drop");
        }
        self.release();
    }
}
