// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Describe the contents of a generic MIRIAD data set.

 */

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::path::PathBuf;
use std::process;

use viskit::{AccessMode, DataSet};

fn main() {
    let matches = Command::new("dsls")
        .version("0.1.0")
        .about("Describe the contents of a MIRIAD data set.")
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

    let mut names = ds.list_items().context("cannot list dataset items")?;
    names.sort();

    for name in &names {
        let info = ds
            .probe_item(name)
            .with_context(|| format!("cannot probe item \"{}\"", name))?
            .expect("listed item vanished");

        let value = match info.format_value() {
            Some(v) => v,
            None => format!("({} values)", info.n_vals),
        };

        println!("  {:<8}  {:<9}  {}", info.name, info.ty, value);
    }

    Ok(0)
}
