// Copyright 2017-2022 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!

Copy the contents of one MIRIAD data set into another, appending.

Small items are merged: one that already exists in the destination must
agree with the source exactly. Large items are streamed over byte-by-byte.

 */

use anyhow::{bail, ensure, Context};
use clap::{value_parser, Arg, Command};
use std::path::PathBuf;
use std::process;

use viskit::{iostream, AccessMode, DataSet, OpenFlags};

fn main() {
    let matches = Command::new("dscopy")
        .version("0.1.0")
        .about("Append-copy one MIRIAD data set into another.")
        .arg(
            Arg::new("INPUT")
                .help("The path to the source dataset")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("OUTPUT")
                .help("The path to the destination dataset")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(2),
        )
        .get_matches();

    let input = matches.get_one::<PathBuf>("INPUT").unwrap();
    let output = matches.get_one::<PathBuf>("OUTPUT").unwrap();

    process::exit(match inner(input, output) {
        Ok(code) => code,

        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    });
}

fn inner(input: &PathBuf, output: &PathBuf) -> anyhow::Result<i32> {
    let dsin = DataSet::open(input, AccessMode::Read, Default::default())
        .with_context(|| format!("cannot open \"{}\" for input", input.display()))?;

    let out_flags = OpenFlags {
        create_ok: true,
        append: true,
        ..Default::default()
    };
    let mut dsout = DataSet::open(output, AccessMode::Write, out_flags)
        .with_context(|| format!("cannot open \"{}\" for output", output.display()))?;

    for name in dsin.list_items().context("cannot list source items")? {
        let info = dsin
            .probe_item(&name)
            .with_context(|| format!("cannot probe item \"{}\"", name))?
            .expect("listed item vanished");

        if !info.is_large {
            let data = info.small_data.as_deref().expect("small item with no data");

            if dsout.has_item(&name) {
                let existing = dsout
                    .probe_item(&name)?
                    .expect("item vanished from the destination");

                ensure!(
                    !existing.is_large,
                    "item \"{}\" is small in the source but large in the destination",
                    name
                );
                ensure!(
                    existing.ty == info.ty
                        && existing.n_vals == info.n_vals
                        && existing.small_data.as_deref() == Some(data),
                    "existing item \"{}\" in the destination disagrees with the source",
                    name
                );
            } else if let Err(e) = dsout.set_small_item(&name, info.ty, data, true) {
                bail!("cannot copy small item \"{}\": {}", name, e.describe());
            }
        } else {
            let mut ioin = dsin
                .open_large_item(&name, AccessMode::Read, Default::default())
                .with_context(|| format!("cannot open source item \"{}\"", name))?;

            let item_flags = OpenFlags {
                create_ok: true,
                append: true,
                ..Default::default()
            };
            let mut ioout = dsout
                .open_large_item(&name, AccessMode::Write, item_flags)
                .with_context(|| format!("cannot open destination item \"{}\"", name))?;

            iostream::pipe(&mut ioin, &mut ioout)
                .with_context(|| format!("cannot copy large item \"{}\"", name))?;

            ioin.close()?;
            ioout
                .close()
                .with_context(|| format!("cannot finish writing item \"{}\"", name))?;
        }
    }

    dsout.close().context("cannot close the destination")?;
    dsin.close().context("cannot close the source")?;
    Ok(0)
}
