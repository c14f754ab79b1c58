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

//! File lookup hook used by PROJ to locate support files (e.g. the `epsg`
//! init file behind `+init=epsg:4326`).
//!
//! `pj_set_finder` accepts a bare C function pointer without user data, so
//! the active [`Finder`] is published in a process-wide slot that the
//! [`find_file`] trampoline reads.

use std::collections::HashMap;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use parking_lot::Mutex;

use crate::error::{Proj4Error, Result};

/// Ordered search paths plus a memo of every lookup made through them
///
/// Lookups are cached whether or not they succeed, and the cache is never
/// invalidated: reconfiguring means building a new `Finder`. The cached
/// C strings are the pointers handed back to PROJ, so they stay valid for as
/// long as the `Finder` lives.
#[derive(Debug)]
pub struct Finder {
    search_paths: Vec<PathBuf>,
    cache: Mutex<HashMap<OsString, Option<Resolved>>>,
    probes: AtomicUsize,
}

#[derive(Debug)]
struct Resolved {
    path: PathBuf,
    c_path: CString,
}

impl Finder {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
            cache: Mutex::new(HashMap::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Resolve `name` against the search paths, first match wins
    pub fn find(&self, name: impl AsRef<OsStr>) -> Option<PathBuf> {
        let mut cache = self.cache.lock();
        let found = self
            .resolve(&mut cache, name.as_ref())
            .as_ref()
            .map(|resolved| resolved.path.clone());
        found
    }

    /// Like [`Finder::find`] but reports a miss as an error
    pub fn try_find(&self, name: impl AsRef<OsStr>) -> Result<PathBuf> {
        let name = name.as_ref();
        self.find(name).ok_or_else(|| {
            Proj4Error::ResolutionMiss(name.to_string_lossy().into_owned())
        })
    }

    /// Number of filesystem probes performed so far
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }

    /// Number of names with a cached outcome (found or not)
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Lookup on behalf of PROJ; null means "no path"
    fn find_c(&self, name: &CStr) -> *const c_char {
        let Some(name) = c_name_to_os_str(name) else {
            log::warn!("PROJ requested a file name that is not valid on this platform: {name:?}");
            return ptr::null();
        };

        let mut cache = self.cache.lock();
        // The CString buffer is heap allocated and entries are never removed,
        // so the pointer outlives the lock guard.
        let found = match self.resolve(&mut cache, name) {
            Some(resolved) => resolved.c_path.as_ptr(),
            None => ptr::null(),
        };
        found
    }

    fn resolve<'a>(
        &self,
        cache: &'a mut HashMap<OsString, Option<Resolved>>,
        name: &OsStr,
    ) -> &'a Option<Resolved> {
        if !cache.contains_key(name) {
            let resolved = self.probe(name);
            cache.insert(name.to_os_string(), resolved);
        }

        &cache[name]
    }

    fn probe(&self, name: &OsStr) -> Option<Resolved> {
        let display_name = name.to_string_lossy();
        for dir in &self.search_paths {
            let candidate = dir.join(name);
            self.probes.fetch_add(1, Ordering::Relaxed);
            if std::fs::metadata(&candidate).is_err() {
                continue;
            }

            match path_to_cstring(&candidate) {
                Some(c_path) => {
                    log::debug!(
                        "Resolved PROJ file '{display_name}' to {}",
                        candidate.display()
                    );
                    return Some(Resolved {
                        path: candidate,
                        c_path,
                    });
                }
                None => {
                    log::warn!(
                        "Ignoring {} for PROJ file '{display_name}': path cannot be passed to C",
                        candidate.display()
                    );
                }
            }
        }

        log::debug!(
            "PROJ file '{display_name}' not found in {:?}",
            self.search_paths
        );
        None
    }
}

#[cfg(unix)]
fn c_name_to_os_str(name: &CStr) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(name.to_bytes()))
}

#[cfg(not(unix))]
fn c_name_to_os_str(name: &CStr) -> Option<&OsStr> {
    name.to_str().ok().map(OsStr::new)
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Option<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).ok()
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Option<CString> {
    CString::new(path.to_str()?).ok()
}

/// The finder PROJ currently calls back into. Normally set once on
/// application start.
static ACTIVE_FINDER: RwLock<Option<Arc<Finder>>> = RwLock::new(None);

/// The finder currently registered with PROJ, if any
pub fn active_finder() -> Option<Arc<Finder>> {
    ACTIVE_FINDER.read().ok().and_then(|active| active.clone())
}

pub(crate) fn install(finder: Option<Arc<Finder>>) {
    match ACTIVE_FINDER.write() {
        Ok(mut active) => *active = finder,
        Err(poisoned) => *poisoned.into_inner() = finder,
    }
}

/// Empty the slot if it still holds `finder`; returns whether it did
pub(crate) fn uninstall(finder: &Arc<Finder>) -> bool {
    let mut active = match ACTIVE_FINDER.write() {
        Ok(active) => active,
        Err(poisoned) => poisoned.into_inner(),
    };

    match active.as_ref() {
        Some(current) if Arc::ptr_eq(current, finder) => {
            *active = None;
            true
        }
        _ => false,
    }
}

/// Trampoline registered with `pj_set_finder`
pub(crate) unsafe extern "C" fn find_file(name: *const c_char) -> *const c_char {
    if name.is_null() {
        return ptr::null();
    }

    let Ok(active) = ACTIVE_FINDER.read() else {
        return ptr::null();
    };

    match active.as_ref() {
        Some(finder) => finder.find_c(unsafe { CStr::from_ptr(name) }),
        None => ptr::null(),
    }
}
