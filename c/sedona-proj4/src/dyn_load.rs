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

//! Dynamic loader for the PROJ 4 API symbols using `libloading`.
//!
//! The `pj_*` functions were removed from PROJ 8, so the library is never
//! linked at build time; a compatible shared object is opened at runtime.

use std::path::Path;

use libloading::Library;

use crate::error::Proj4Error;
use crate::proj_api_bindgen::ProjApi;

/// Load a single symbol from the library and write it into the given field.
///
/// The symbol is loaded as a raw `*const ()` pointer and transmuted to the
/// function pointer type of the field, since each field has a different
/// signature that cannot be passed generically to `Library::get`.
macro_rules! load_fn {
    ($lib:expr, $api:expr, $name:ident) => {
        #[allow(clippy::missing_transmute_annotations)]
        {
            $api.$name = Some(unsafe {
                let sym = $lib
                    .get::<*const ()>(concat!(stringify!($name), "\0").as_bytes())
                    .map_err(|e| {
                        Proj4Error::Library(format!(
                            "Failed to load symbol {}: {}",
                            stringify!($name),
                            e
                        ))
                    })?;
                std::mem::transmute(sym.into_raw().into_raw())
            });
        }
    };
}

/// Like [`load_fn`] but leaves the field empty when the symbol is absent.
macro_rules! load_optional_fn {
    ($lib:expr, $api:expr, $name:ident) => {
        #[allow(clippy::missing_transmute_annotations)]
        {
            $api.$name = unsafe {
                match $lib.get::<*const ()>(concat!(stringify!($name), "\0").as_bytes()) {
                    Ok(sym) => Some(std::mem::transmute(sym.into_raw().into_raw())),
                    Err(e) => {
                        log::debug!("Optional symbol {} not available: {}", stringify!($name), e);
                        None
                    }
                }
            };
        }
    };
}

/// Populate the function-pointer fields of [`ProjApi`] from the given
/// [`Library`] handle.
fn load_all_symbols(lib: &Library, api: &mut ProjApi) -> Result<(), Proj4Error> {
    load_fn!(lib, api, pj_ctx_alloc);
    load_fn!(lib, api, pj_ctx_free);
    load_fn!(lib, api, pj_ctx_get_errno);
    load_fn!(lib, api, pj_get_errno_ref);
    load_fn!(lib, api, pj_init_plus_ctx);
    load_fn!(lib, api, pj_free);
    load_fn!(lib, api, pj_is_latlong);
    load_fn!(lib, api, pj_is_geocent);
    load_fn!(lib, api, pj_get_def);
    load_fn!(lib, api, pj_dalloc);
    load_fn!(lib, api, pj_transform);
    load_fn!(lib, api, pj_strerrno);
    load_fn!(lib, api, pj_set_finder);
    load_optional_fn!(lib, api, pj_get_release);

    Ok(())
}

/// Load a PROJ shared library from `path` and populate a [`ProjApi`] struct.
///
/// Returns the `(Library, ProjApi)` pair. The caller is responsible for
/// keeping the `Library` alive for the lifetime of the function pointers.
pub(crate) fn load_proj4_from_path(path: &Path) -> Result<(Library, ProjApi), Proj4Error> {
    let lib = unsafe { Library::new(path.as_os_str()) }.map_err(|e| {
        Proj4Error::Library(format!(
            "Failed to load PROJ library from {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut api = ProjApi::default();
    load_all_symbols(&lib, &mut api)?;
    Ok((lib, api))
}
