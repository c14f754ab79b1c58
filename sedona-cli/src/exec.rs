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

//! Line oriented coordinate input and output for the `transform` command

use std::io::{BufRead, Write};

use sedona_proj4::Proj4Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Proj4(#[from] Proj4Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Units and batching applied around the transform callback
#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    /// Input longitudes/latitudes are degrees that must become radians
    pub degrees_in: bool,
    /// Output longitudes/latitudes are radians that must become degrees
    pub degrees_out: bool,
    pub batch_size: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            degrees_in: false,
            degrees_out: false,
            batch_size: 4096,
        }
    }
}

/// Parallel coordinate buffers handed to a transform in one call
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoordinateBatch {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub zs: Option<Vec<f64>>,
}

impl CoordinateBatch {
    fn len(&self) -> usize {
        self.xs.len()
    }

    fn has_z(&self) -> bool {
        self.zs.is_some()
    }

    fn push(&mut self, coord: [f64; 2], z: Option<f64>) {
        self.xs.push(coord[0]);
        self.ys.push(coord[1]);
        if let (Some(zs), Some(z)) = (self.zs.as_mut(), z) {
            zs.push(z);
        }
    }

    fn clear(&mut self, with_z: bool) {
        self.xs.clear();
        self.ys.clear();
        self.zs = with_z.then(Vec::new);
    }
}

/// Parse `x y [z]`, returning `None` for blank lines and `#` comments
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<([f64; 2], Option<f64>)>> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }

    let values = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|field| !field.is_empty())
        .map(|field| {
            field.parse::<f64>().map_err(|e| CliError::Parse {
                line: line_number,
                message: format!("invalid coordinate '{field}': {e}"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match values.as_slice() {
        [x, y] => Ok(Some(([*x, *y], None))),
        [x, y, z] => Ok(Some(([*x, *y], Some(*z)))),
        other => Err(CliError::Parse {
            line: line_number,
            message: format!("expected 2 or 3 values, found {}", other.len()),
        }),
    }
}

/// Read coordinates from `reader`, transform them in batches with
/// `transform` and write the results to `writer`
///
/// A batch is flushed when it reaches `batch_size` or when the presence of a
/// Z value changes between lines. Returns the number of coordinates written.
pub fn exec_transform<R, W, F>(
    reader: R,
    writer: &mut W,
    options: &TransformOptions,
    mut transform: F,
) -> Result<usize>
where
    R: BufRead,
    W: Write,
    F: FnMut(&mut CoordinateBatch) -> Result<()>,
{
    let batch_size = options.batch_size.max(1);
    let mut batch = CoordinateBatch::default();
    let mut written = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((mut coord, z)) = parse_line(&line, index + 1)? else {
            continue;
        };

        if batch.len() > 0 && batch.has_z() != z.is_some() {
            written += flush(&mut batch, writer, options, &mut transform)?;
        }
        if batch.len() == 0 {
            batch.clear(z.is_some());
        }

        if options.degrees_in {
            coord = coord.map(f64::to_radians);
        }
        batch.push(coord, z);

        if batch.len() >= batch_size {
            written += flush(&mut batch, writer, options, &mut transform)?;
        }
    }

    if batch.len() > 0 {
        written += flush(&mut batch, writer, options, &mut transform)?;
    }

    writer.flush()?;
    Ok(written)
}

fn flush<W, F>(
    batch: &mut CoordinateBatch,
    writer: &mut W,
    options: &TransformOptions,
    transform: &mut F,
) -> Result<usize>
where
    W: Write,
    F: FnMut(&mut CoordinateBatch) -> Result<()>,
{
    log::debug!("Transforming batch of {} coordinates", batch.len());
    transform(batch)?;

    let convert = |v: f64| if options.degrees_out { v.to_degrees() } else { v };
    for i in 0..batch.len() {
        let (x, y) = (convert(batch.xs[i]), convert(batch.ys[i]));
        match &batch.zs {
            Some(zs) => writeln!(writer, "{x} {y} {}", zs[i])?,
            None => writeln!(writer, "{x} {y}")?,
        }
    }

    let count = batch.len();
    batch.clear(false);
    Ok(count)
}
