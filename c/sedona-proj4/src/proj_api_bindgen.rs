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
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_long, c_void};

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct projCtx_t {
    _unused: [u8; 0],
}
pub type projCtx = *mut projCtx_t;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct PJconsts {
    _unused: [u8; 0],
}
pub type projPJ = *mut PJconsts;

/// Signature of the file lookup hook accepted by `pj_set_finder`.
pub type PjFinder = unsafe extern "C" fn(name: *const c_char) -> *const c_char;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct ProjApi {
    pub pj_ctx_alloc: Option<unsafe extern "C" fn() -> projCtx>,
    pub pj_ctx_free: Option<unsafe extern "C" fn(ctx: projCtx)>,
    pub pj_ctx_get_errno: Option<unsafe extern "C" fn(ctx: projCtx) -> c_int>,
    pub pj_get_errno_ref: Option<unsafe extern "C" fn() -> *mut c_int>,
    pub pj_init_plus_ctx:
        Option<unsafe extern "C" fn(ctx: projCtx, definition: *const c_char) -> projPJ>,
    pub pj_free: Option<unsafe extern "C" fn(P: projPJ)>,
    pub pj_is_latlong: Option<unsafe extern "C" fn(P: projPJ) -> c_int>,
    pub pj_is_geocent: Option<unsafe extern "C" fn(P: projPJ) -> c_int>,
    pub pj_get_def: Option<unsafe extern "C" fn(P: projPJ, options: c_int) -> *mut c_char>,
    pub pj_dalloc: Option<unsafe extern "C" fn(ptr: *mut c_void)>,
    pub pj_transform: Option<
        unsafe extern "C" fn(
            src: projPJ,
            dst: projPJ,
            point_count: c_long,
            point_offset: c_int,
            x: *mut f64,
            y: *mut f64,
            z: *mut f64,
        ) -> c_int,
    >,
    pub pj_strerrno: Option<unsafe extern "C" fn(err: c_int) -> *mut c_char>,
    pub pj_set_finder: Option<unsafe extern "C" fn(finder: Option<PjFinder>)>,
    pub pj_get_release: Option<unsafe extern "C" fn() -> *const c_char>,
}
