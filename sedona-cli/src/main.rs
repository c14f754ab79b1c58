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
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sedona_proj4::{Finder, Proj4Library, Proj4LibraryBuilder, Transformation};
use sedona_proj4_cli::exec::{self, CliError, Result, TransformOptions};
use sedona_proj4_cli::SEDONA_PROJ4_CLI_VERSION;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(
        long,
        help = "Path to a PROJ shared library exposing proj_api.h (defaults to SEDONA_PROJ4_LIBRARY, then the system library)"
    )]
    library: Option<PathBuf>,

    #[clap(
        short = 's',
        long = "search-path",
        help = "Directory searched for PROJ support files such as 'epsg'; may be repeated, first match wins"
    )]
    search_paths: Vec<PathBuf>,

    #[clap(short, long, help = "Reduce printing other than the results")]
    quiet: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    /// Transform "x y [z]" lines read from files or stdin
    Transform {
        #[clap(long, help = "Source definition, e.g. '+init=epsg:4326'")]
        from: String,

        #[clap(long, help = "Destination definition, e.g. '+init=epsg:25832'")]
        to: String,

        #[clap(
            long,
            help = "Geographic coordinates are given and printed in radians instead of degrees"
        )]
        radians: bool,

        #[clap(
            long,
            help = "Number of coordinates passed to PROJ per call",
            default_value_t = 4096,
            value_parser(parse_batch_size)
        )]
        batch_size: usize,

        #[clap(help = "Input files, stdin when omitted")]
        files: Vec<PathBuf>,
    },

    /// Print the properties of a definition as understood by PROJ
    Info { definition: String },

    /// Print where a support file resolves in the search paths
    Find { name: String },
}

fn parse_batch_size(size: &str) -> std::result::Result<usize, String> {
    match size.parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(format!("Invalid batch size '{size}', expected a positive integer")),
    }
}

/// Calls [`main_inner`], then handles printing errors and returning the correct exit code
pub fn main() -> ExitCode {
    if let Err(e) = main_inner() {
        println!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Main CLI entrypoint
fn main_inner() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match &args.command {
        Command::Find { name } => {
            // Resolution is independent of PROJ itself
            let finder = Finder::new(args.search_paths.iter().cloned());
            println!("{}", finder.try_find(name)?.display());
            Ok(())
        }
        Command::Info { definition } => {
            let library = build_library(&args)?;
            let proj = library.create(definition)?;
            println!("geographic: {}", proj.is_geographic()?);
            println!("geocentric: {}", proj.is_geocentric()?);
            println!("definition: {}", proj.definition()?);
            Ok(())
        }
        Command::Transform {
            from,
            to,
            radians,
            batch_size,
            files,
        } => {
            let library = build_library(&args)?;
            let src = library.create(from)?;
            let dst = library.create(to)?;
            let transformation = Transformation::new(&src, &dst);

            let options = TransformOptions {
                degrees_in: !radians && src.is_geographic()?,
                degrees_out: !radians && dst.is_geographic()?,
                batch_size: *batch_size,
            };

            let mut transform = |batch: &mut exec::CoordinateBatch| -> Result<()> {
                transformation.transform_raw(&mut batch.xs, &mut batch.ys, batch.zs.as_deref_mut())?;
                Ok(())
            };

            let stdout = io::stdout();
            let mut out = stdout.lock();
            let written = if files.is_empty() {
                exec::exec_transform(io::stdin().lock(), &mut out, &options, &mut transform)?
            } else {
                let mut written = 0;
                for file in files {
                    let reader = File::open(file).map_err(|e| {
                        CliError::Io(io::Error::new(
                            e.kind(),
                            format!("{}: {e}", file.display()),
                        ))
                    })?;
                    written += exec::exec_transform(
                        BufReader::new(reader),
                        &mut out,
                        &options,
                        &mut transform,
                    )?;
                }
                written
            };

            log::info!("Transformed {written} coordinates");
            Ok(())
        }
    }
}

fn build_library(args: &Args) -> Result<std::sync::Arc<Proj4Library>> {
    let mut builder = Proj4LibraryBuilder::default();
    if let Some(path) = &args.library {
        builder = builder.with_shared_library(path);
    }
    if !args.search_paths.is_empty() {
        builder = builder.with_search_paths(args.search_paths.iter().cloned());
    }

    let library = builder.build()?;
    if !args.quiet {
        eprintln!(
            "sedona-proj4 v{SEDONA_PROJ4_CLI_VERSION} using {}",
            library.version().unwrap_or_else(|| "PROJ".to_string())
        );
    }
    Ok(library)
}
