// flatsift: Filters for EMBL and GenBank flat files, and alignment hit annotation.
//
// Copyright 2025 Maxime Déraspe [maximilien1er@gmail.com].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use flatsift::Format;
use flatsift::cli::FilterCli;

fn main() {
    let cli: FilterCli = flatsift::cli::parse_args("Select records from a GenBank flat file by taxon or identifier, or convert them to fasta");
    flatsift::cli::init_log(if cli.verbose { 2 } else { 1 });

    if let Err(e) = flatsift::cli::run_filter(Format::Gbk, &cli) {
        flatsift::cli::exit_with_error::<FilterCli>(e);
    }
}
