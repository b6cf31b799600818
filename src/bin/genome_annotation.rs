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
use flatsift::cli::AnnotationCli;

fn main() {
    let cli: AnnotationCli = flatsift::cli::parse_args("Build a GFF3 genome annotation from kAAmer protein hits");
    flatsift::cli::init_log(if cli.verbose { 2 } else { 1 });

    if let Err(e) = flatsift::cli::run_annotation(&cli) {
        flatsift::cli::exit_with_error::<AnnotationCli>(e);
    }
}
