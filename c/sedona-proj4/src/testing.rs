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

//! In-process stand-in for the PROJ 4 C API used by the unit tests.
//!
//! Supports `+proj=longlat`, `+proj=geocent`, `+proj=merc` and
//! `+proj=utm` (zones 1-60) plus `+init=<file>:<code>` resolved through the
//! registered finder. "Projecting" scales coordinates by [`FAKE_SCALE`];
//! a NaN coordinate fails the batch with error -14 at that index.
//! Bookkeeping is per thread so tests can run in parallel.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long, c_void};
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::library::Proj4Library;
use crate::proj_api_bindgen::{projCtx, projCtx_t, projPJ, PJconsts, PjFinder, ProjApi};

/// Serialises tests that touch the process-wide finder slot
pub(crate) static FINDER_LOCK: Mutex<()> = parking_lot::const_mutex(());

pub(crate) const FAKE_SCALE: f64 = 1000.0;

struct FakeCtx {
    errno: c_int,
}

struct FakePj {
    geographic: bool,
    geocentric: bool,
    definition: String,
}

#[derive(Default, Clone, Copy)]
struct Counters {
    contexts_allocated: usize,
    live_contexts: isize,
    live_projections: isize,
    outstanding_definitions: isize,
    transform_calls: usize,
    last_point_count: c_long,
    last_point_offset: c_int,
}

thread_local! {
    static COUNTERS: Cell<Counters> = Cell::new(Counters::default());
    static FAIL_CTX_ALLOC: Cell<Option<c_int>> = const { Cell::new(None) };
    static GLOBAL_ERRNO: Cell<c_int> = const { Cell::new(0) };
    static FINDER: Cell<Option<PjFinder>> = const { Cell::new(None) };
    static SECOND_FINDER: Cell<Option<PjFinder>> = const { Cell::new(None) };
    static ERROR_STRINGS: RefCell<Vec<CString>> = const { RefCell::new(Vec::new()) };
}

fn update(f: impl FnOnce(&mut Counters)) {
    COUNTERS.with(|c| {
        let mut counters = c.get();
        f(&mut counters);
        c.set(counters);
    })
}

fn counters() -> Counters {
    COUNTERS.with(|c| c.get())
}

/// A library backed by the fake API, with this thread's bookkeeping reset
pub(crate) fn fake_library() -> Arc<Proj4Library> {
    COUNTERS.with(|c| c.set(Counters::default()));
    FAIL_CTX_ALLOC.with(|f| f.set(None));
    GLOBAL_ERRNO.with(|e| e.set(0));
    FINDER.with(|f| f.set(None));
    Arc::new(unsafe { Proj4Library::from_api(fake_api()) })
}

/// Another fake library sharing the counters of [`fake_library`] but with
/// its own `pj_set_finder` registration, like a second PROJ build loaded into
/// the same process. Call after [`fake_library`], which resets the counters.
pub(crate) fn second_fake_library() -> Arc<Proj4Library> {
    SECOND_FINDER.with(|f| f.set(None));
    let api = ProjApi {
        pj_set_finder: Some(fake_set_second_finder),
        ..fake_api()
    };
    Arc::new(unsafe { Proj4Library::from_api(api) })
}

pub(crate) fn fake_api() -> ProjApi {
    ProjApi {
        pj_ctx_alloc: Some(fake_ctx_alloc),
        pj_ctx_free: Some(fake_ctx_free),
        pj_ctx_get_errno: Some(fake_ctx_get_errno),
        pj_get_errno_ref: Some(fake_get_errno_ref),
        pj_init_plus_ctx: Some(fake_init_plus_ctx),
        pj_free: Some(fake_free),
        pj_is_latlong: Some(fake_is_latlong),
        pj_is_geocent: Some(fake_is_geocent),
        pj_get_def: Some(fake_get_def),
        pj_dalloc: Some(fake_dalloc),
        pj_transform: Some(fake_transform),
        pj_strerrno: Some(fake_strerrno),
        pj_set_finder: Some(fake_set_finder),
        pj_get_release: Some(fake_get_release),
    }
}

pub(crate) fn contexts_allocated() -> usize {
    counters().contexts_allocated
}

pub(crate) fn live_contexts() -> isize {
    counters().live_contexts
}

pub(crate) fn live_projections() -> isize {
    counters().live_projections
}

pub(crate) fn outstanding_definitions() -> isize {
    counters().outstanding_definitions
}

pub(crate) fn transform_calls() -> usize {
    counters().transform_calls
}

/// `(point_count, point_offset)` of the most recent `pj_transform` call
pub(crate) fn last_transform_shape() -> (c_long, c_int) {
    let c = counters();
    (c.last_point_count, c.last_point_offset)
}

pub(crate) fn fail_next_context_allocation(errno: c_int) {
    FAIL_CTX_ALLOC.with(|f| f.set(Some(errno)));
}

/// Call the finder PROJ would see, as PROJ itself does during init
pub(crate) fn call_registered_finder(name: &str) -> Option<String> {
    call_finder(FINDER.with(|f| f.get())?, name)
}

/// [`call_registered_finder`] for the [`second_fake_library`]
pub(crate) fn call_second_registered_finder(name: &str) -> Option<String> {
    call_finder(SECOND_FINDER.with(|f| f.get())?, name)
}

fn call_finder(finder: PjFinder, name: &str) -> Option<String> {
    let name = CString::new(name).ok()?;
    let found = unsafe { finder(name.as_ptr()) };
    if found.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(found) }.to_string_lossy().into_owned())
    }
}

unsafe extern "C" fn fake_ctx_alloc() -> projCtx {
    if let Some(errno) = FAIL_CTX_ALLOC.with(|f| f.take()) {
        GLOBAL_ERRNO.with(|e| e.set(errno));
        return ptr::null_mut();
    }

    update(|c| {
        c.contexts_allocated += 1;
        c.live_contexts += 1;
    });
    Box::into_raw(Box::new(FakeCtx { errno: 0 })) as *mut projCtx_t
}

unsafe extern "C" fn fake_ctx_free(ctx: projCtx) {
    update(|c| c.live_contexts -= 1);
    drop(unsafe { Box::from_raw(ctx as *mut FakeCtx) });
}

unsafe extern "C" fn fake_ctx_get_errno(ctx: projCtx) -> c_int {
    unsafe { (*(ctx as *mut FakeCtx)).errno }
}

unsafe extern "C" fn fake_get_errno_ref() -> *mut c_int {
    GLOBAL_ERRNO.with(|e| e.as_ptr())
}

fn parse_definition(definition: &str) -> Result<FakePj, c_int> {
    let mut params: Vec<String> = definition
        .split_whitespace()
        .map(|p| p.to_string())
        .collect();
    if params.is_empty() {
        return Err(-1);
    }

    if let Some(init) = params
        .iter()
        .find_map(|p| p.strip_prefix("+init=").map(|s| s.to_string()))
    {
        let (file, code) = init.split_once(':').ok_or(-3)?;
        let expanded = expand_init(file, code)?;
        params.retain(|p| !p.starts_with("+init="));
        params.extend(expanded.split_whitespace().map(|p| p.to_string()));
    }

    let proj = params
        .iter()
        .find_map(|p| p.strip_prefix("+proj="))
        .ok_or(-4)?;

    let (geographic, geocentric) = match proj {
        "longlat" | "latlong" => (true, false),
        "geocent" => (false, true),
        "merc" => (false, false),
        "utm" => {
            let zone = params
                .iter()
                .find_map(|p| p.strip_prefix("+zone="))
                .and_then(|z| z.parse::<i32>().ok())
                .ok_or(-35)?;
            if !(1..=60).contains(&zone) {
                return Err(-35);
            }
            (false, false)
        }
        _ => return Err(-5),
    };

    Ok(FakePj {
        geographic,
        geocentric,
        definition: params.join(" "),
    })
}

/// Look `<code>` up in an init file located through the registered finder
fn expand_init(file: &str, code: &str) -> Result<String, c_int> {
    let path = call_registered_finder(file).ok_or(2)?;
    let contents = std::fs::read_to_string(path).map_err(|_| 2)?;
    let key = format!("<{code}>");

    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix(key.as_str()))
        .map(|rest| rest.trim().trim_end_matches("<>").trim().to_string())
        .ok_or(-2)
}

unsafe extern "C" fn fake_init_plus_ctx(ctx: projCtx, definition: *const c_char) -> projPJ {
    let definition = unsafe { CStr::from_ptr(definition) }.to_string_lossy();
    match parse_definition(&definition) {
        Ok(pj) => {
            update(|c| c.live_projections += 1);
            Box::into_raw(Box::new(pj)) as *mut PJconsts
        }
        Err(errno) => {
            unsafe { (*(ctx as *mut FakeCtx)).errno = errno };
            ptr::null_mut()
        }
    }
}

unsafe extern "C" fn fake_free(pj: projPJ) {
    update(|c| c.live_projections -= 1);
    drop(unsafe { Box::from_raw(pj as *mut FakePj) });
}

fn fake_pj<'a>(pj: projPJ) -> &'a FakePj {
    unsafe { &*(pj as *const FakePj) }
}

unsafe extern "C" fn fake_is_latlong(pj: projPJ) -> c_int {
    fake_pj(pj).geographic as c_int
}

unsafe extern "C" fn fake_is_geocent(pj: projPJ) -> c_int {
    fake_pj(pj).geocentric as c_int
}

unsafe extern "C" fn fake_get_def(pj: projPJ, _options: c_int) -> *mut c_char {
    update(|c| c.outstanding_definitions += 1);
    let definition = format!(" {}", fake_pj(pj).definition);
    CString::new(definition)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

unsafe extern "C" fn fake_dalloc(ptr: *mut c_void) {
    update(|c| c.outstanding_definitions -= 1);
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

unsafe extern "C" fn fake_transform(
    src: projPJ,
    dst: projPJ,
    point_count: c_long,
    point_offset: c_int,
    x: *mut f64,
    y: *mut f64,
    _z: *mut f64,
) -> c_int {
    update(|c| {
        c.transform_calls += 1;
        c.last_point_count = point_count;
        c.last_point_offset = point_offset;
    });

    let apply = |v: f64| match (fake_pj(src).geographic, fake_pj(dst).geographic) {
        (true, false) => v * FAKE_SCALE,
        (false, true) => v / FAKE_SCALE,
        _ => v,
    };

    for i in 0..point_count as usize {
        let offset = i * point_offset as usize;
        unsafe {
            let xi = x.add(offset);
            let yi = y.add(offset);
            if (*xi).is_nan() || (*yi).is_nan() {
                return -14;
            }
            *xi = apply(*xi);
            *yi = apply(*yi);
        }
    }

    0
}

unsafe extern "C" fn fake_strerrno(err: c_int) -> *mut c_char {
    let message = match err {
        0 => return ptr::null_mut(),
        -1 => "no arguments in initialization list",
        -2 => "no options found in 'init' file",
        -3 => "no colon in init= string",
        -4 => "projection not named",
        -5 => "unknown projection id",
        -14 => "latitude or longitude exceeded limits",
        -35 => "invalid UTM zone number",
        2 => "No such file or directory",
        _ => return ptr::null_mut(),
    };

    // Keep the strings alive for the thread, as PROJ keeps its table static
    ERROR_STRINGS.with(|strings| {
        let mut strings = strings.borrow_mut();
        let Ok(message) = CString::new(message) else {
            return ptr::null_mut();
        };
        strings.push(message);
        strings
            .last()
            .map(|s| s.as_ptr() as *mut c_char)
            .unwrap_or(ptr::null_mut())
    })
}

unsafe extern "C" fn fake_set_finder(finder: Option<PjFinder>) {
    FINDER.with(|f| f.set(finder));
}

unsafe extern "C" fn fake_set_second_finder(finder: Option<PjFinder>) {
    SECOND_FINDER.with(|f| f.set(finder));
}

unsafe extern "C" fn fake_get_release() -> *const c_char {
    c"Rel. 4.9.3 (fake)".as_ptr()
}
