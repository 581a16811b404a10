// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Decode the low-level details of MIRIAD UV data.

 */

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::path::PathBuf;
use std::process;

use viskit::visdata::{UvEvent, UvIo};
use viskit::{AccessMode, DataSet};

fn main() {
    let matches = Command::new("uvdump")
        .version("0.1.0")
        .about("Decode MIRIAD UV data verbosely.")
        .arg(
            Arg::new("PATH")
                .help("The path to the dataset directory")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let path = matches.get_one::<PathBuf>("PATH").unwrap();

    process::exit(match inner(path) {
        Ok(code) => code,

        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    });
}

fn inner(path: &PathBuf) -> anyhow::Result<i32> {
    let ds = DataSet::open(path, AccessMode::Read, Default::default())
        .with_context(|| format!("cannot open dataset \"{}\"", path.display()))?;
    let mut uv = UvIo::open(&ds, AccessMode::Read, Default::default())
        .context("cannot open UV stream")?;

    let mut n_records = 0usize;

    loop {
        match uv.read_next().context("cannot read UV stream")? {
            UvEvent::Size(var) => {
                println!("size  {:<8}  {} x {}", var.name(), var.n_vals(), var.type_());
            }

            UvEvent::Data(var) => {
                println!("data  {:<8}  {}", var.name(), var.format_value());
            }

            UvEvent::EndOfRecord => {
                println!("--- end of record ---");
                n_records += 1;
            }

            UvEvent::EndOfStream => break,
        }
    }

    println!("{} records", n_records);
    Ok(0)
}
