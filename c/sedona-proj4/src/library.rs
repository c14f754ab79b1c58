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
use std::ffi::CStr;
use std::fmt::Debug;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;

use crate::dyn_load::load_proj4_from_path;
use crate::error::{Proj4Error, Result};
use crate::finder::{self, Finder};
use crate::projection::Projection;
use crate::proj_api_bindgen::ProjApi;

/// Environment variable consulted for the shared library location when no
/// explicit path was configured
pub const PROJ4_LIBRARY_ENV: &str = "SEDONA_PROJ4_LIBRARY";

/// Fetch a function pointer from a [`ProjApi`] or return a library error
/// naming the missing symbol.
macro_rules! proj_fn {
    ($api:expr, $name:ident) => {
        $api.$name.ok_or_else(|| {
            $crate::error::Proj4Error::Library(format!(
                "PROJ symbol {} is not loaded",
                stringify!($name)
            ))
        })?
    };
}
pub(crate) use proj_fn;

/// A loaded PROJ 4 shared library
///
/// Handles created from a library hold an [`Arc`] to it, so the shared object
/// stays mapped until the last handle is gone.
pub struct Proj4Library {
    api: ProjApi,
    path: Option<PathBuf>,
    // Finder most recently installed through this library while its hook is
    // registered; the process-wide slot may since hold another library's
    installed: Mutex<Option<Arc<Finder>>>,
    // Dropped last: the function pointers in `api` point into this mapping
    _lib: Option<Library>,
}

impl Debug for Proj4Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proj4Library")
            .field("path", &self.path)
            .finish()
    }
}

impl Proj4Library {
    /// Load the PROJ 4 API from the shared object at `path`
    pub fn try_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (lib, api) = load_proj4_from_path(path)?;
        let library = Self {
            api,
            path: Some(path.to_path_buf()),
            installed: Mutex::new(None),
            _lib: Some(lib),
        };

        log::debug!(
            "Loaded PROJ from {} (release: {})",
            path.display(),
            library.version().as_deref().unwrap_or("unknown")
        );
        Ok(library)
    }

    /// Wrap a function table that is already resolved, e.g. a statically
    /// linked PROJ or an in-process stand-in.
    ///
    /// # Safety
    ///
    /// Every populated function pointer must follow the `proj_api.h` contract
    /// and remain callable for the lifetime of the returned value.
    pub unsafe fn from_api(api: ProjApi) -> Self {
        Self {
            api,
            path: None,
            installed: Mutex::new(None),
            _lib: None,
        }
    }

    pub(crate) fn api(&self) -> &ProjApi {
        &self.api
    }

    /// The path this library was loaded from, if it was loaded from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The PROJ release string (e.g. "Rel. 6.3.1, February 10th, 2020")
    pub fn version(&self) -> Option<String> {
        let get_release = self.api.pj_get_release?;
        let ptr = unsafe { get_release() };
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    /// Text PROJ associates with the error code `code`
    pub fn error_message(&self, code: c_int) -> String {
        let message = self.api.pj_strerrno.and_then(|strerrno| {
            let ptr = unsafe { strerrno(code) };
            if ptr.is_null() {
                None
            } else {
                Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
            }
        });

        message.unwrap_or_else(|| format!("PROJ error {code}"))
    }

    /// Create a projection handle from a definition string
    ///
    /// See [`Projection::try_new`].
    pub fn create(self: &Arc<Self>, definition: &str) -> Result<Projection> {
        Projection::try_new(self, definition)
    }

    /// Replace the directories searched for PROJ support files
    ///
    /// The previous search paths and every cached lookup are discarded and the
    /// file lookup hook is (re-)registered with PROJ. The hook is process-wide,
    /// so the most recent call on any library wins. Must not be called while
    /// any other thread is creating projections.
    pub fn set_search_paths<I, P>(&self, paths: I) -> Result<Arc<Finder>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let set_finder = proj_fn!(self.api, pj_set_finder);
        let finder = Arc::new(Finder::new(paths));

        let mut installed = self.installed.lock();
        finder::install(Some(finder.clone()));
        unsafe { set_finder(Some(finder::find_file)) };
        installed.replace(finder.clone());

        log::debug!("PROJ search paths set to {:?}", finder.search_paths());
        Ok(finder)
    }

    /// Unregister the file lookup hook from this library so that PROJ falls
    /// back to its own resolution (e.g. the PROJ_LIB environment variable)
    ///
    /// The process-wide finder is only removed if this library installed it;
    /// a finder installed later through another library stays active for that
    /// library.
    pub fn clear_search_paths(&self) -> Result<()> {
        let set_finder = proj_fn!(self.api, pj_set_finder);

        let mut installed = self.installed.lock();
        unsafe { set_finder(None) };
        let removed = match installed.take() {
            Some(mine) => finder::uninstall(&mine),
            None => false,
        };

        log::debug!("PROJ search paths cleared (process-wide finder removed: {removed})");
        Ok(())
    }

    /// The finder PROJ consults for this library, if its hook is registered
    ///
    /// This is the process-wide active finder, which may have been installed
    /// through another library since this one last set its search paths.
    pub fn finder(&self) -> Option<Arc<Finder>> {
        let installed = self.installed.lock();
        installed.as_ref().and_then(|_| finder::active_finder())
    }
}

/// Builder for a [`Proj4Library`]
///
/// Intended to be configured once at application start: the search paths
/// (if any) are registered before `build()` returns and before any
/// projection can be created from the library.
#[derive(Debug, Default, Clone)]
pub struct Proj4LibraryBuilder {
    shared_library_path: Option<PathBuf>,
    search_paths: Option<Vec<PathBuf>>,
}

impl Proj4LibraryBuilder {
    /// Load PROJ from a specific shared object instead of searching for one
    pub fn with_shared_library(self, path: impl Into<PathBuf>) -> Self {
        Self {
            shared_library_path: Some(path.into()),
            ..self
        }
    }

    /// Directories searched for support files such as `epsg`
    pub fn with_search_paths<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: Some(paths.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    pub fn build(&self) -> Result<Arc<Proj4Library>> {
        let library = match &self.shared_library_path {
            Some(path) => Proj4Library::try_from_path(path)?,
            None => match std::env::var_os(PROJ4_LIBRARY_ENV) {
                Some(path) => Proj4Library::try_from_path(PathBuf::from(path))?,
                None => Self::load_default()?,
            },
        };

        let library = Arc::new(library);
        if let Some(search_paths) = &self.search_paths {
            library.set_search_paths(search_paths.iter().cloned())?;
        }

        Ok(library)
    }

    fn load_default() -> Result<Proj4Library> {
        let mut failures = Vec::new();
        for candidate in default_library_names() {
            match Proj4Library::try_from_path(candidate) {
                Ok(library) => return Ok(library),
                Err(e) => {
                    log::trace!("Skipping PROJ candidate {candidate}: {e}");
                    failures.push(e.to_string());
                }
            }
        }

        Err(Proj4Error::Library(format!(
            "No PROJ library exposing the proj_api.h symbols could be loaded. \
             Set {PROJ4_LIBRARY_ENV} to its location. Attempts:\n{}",
            failures.join("\n")
        )))
    }
}

/// Shared object names tried, in order, when no path is configured
fn default_library_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["proj.dll", "proj_7.dll", "proj_6.dll", "proj_5.dll"]
    } else if cfg!(target_os = "macos") {
        &[
            "libproj.dylib",
            "libproj.19.dylib",
            "libproj.15.dylib",
            "libproj.13.dylib",
        ]
    } else {
        &[
            "libproj.so",
            "libproj.so.19",
            "libproj.so.15",
            "libproj.so.13",
            "libproj.so.12",
        ]
    }
}
