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

//! Command-line interfaces of the `embl-filter`, `gbk-filter`, and
//! `genome-annotation` binaries.

use crate::Format;
use crate::annotation::AnnotationConfig;
use crate::annotation::GENE_NAME;
use crate::annotation::PROTEIN_NAME;
use crate::annotation::gff::read_genome;
use crate::input::LineSource;
use crate::input::MissingInput;
use crate::input::open_input;
use crate::input::read_list;
use crate::selection::Selection;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::{ArgGroup, CommandFactory, FromArgMatches, Parser, Subcommand};

type E = Box<dyn std::error::Error>;

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct FilterCli {
    #[command(subcommand)]
    pub command: FilterCommands,

    // Verbosity
    #[arg(long = "verbose", global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum FilterCommands {
    // Records whose lineage contains a taxon
    Taxon {
        #[arg(help = "Taxon name, eg. Escherichia")]
        taxon: String,

        #[arg(help = "Input flat file (.gz accepted)")]
        input_file: PathBuf,
    },

    // Split records into one file per taxon
    #[command(name = "taxon_file")]
    TaxonFile {
        #[arg(help = "File with one taxon name per line")]
        taxon_list: PathBuf,

        #[arg(help = "Input flat file (.gz accepted)")]
        input_file: PathBuf,

        // Directory for the <taxon>.dat files
        #[arg(long = "outdir", default_value = ".")]
        out_dir: PathBuf,
    },

    // Convert records to fasta
    Fasta {
        #[arg(help = "Input flat file (.gz accepted)")]
        input_file: PathBuf,
    },

    // Records with an identifier in a list
    Ids {
        #[arg(help = "File with one identifier per line")]
        id_list: PathBuf,

        #[arg(help = "Input flat file (.gz accepted)")]
        input_file: PathBuf,
    },
}

#[derive(Parser)]
#[command(version)]
#[command(group(ArgGroup::new("results").required(true).args(["kaamer_res", "stream"])))]
pub struct AnnotationCli {
    // kAAmer search output
    #[arg(long = "kaamer_res", help = "kAAmer results (tsv, .gz accepted)")]
    pub kaamer_res: Option<PathBuf>,

    // Read results from stdin
    #[arg(long = "stream", help = "Read kAAmer results from stdin")]
    pub stream: bool,

    // Copy of the streamed results
    #[arg(long = "stream-out", default_value = "Kaamer-Res.tsv")]
    pub stream_out: PathBuf,

    // Thresholds
    #[arg(long = "minId", default_value_t = 90.0, help = "Minimum percent identity")]
    pub min_identity: f64,

    #[arg(long = "minLen", default_value_t = 60.0, help = "Minimum hit length in amino acids")]
    pub min_length: f64,

    // Attribute columns
    #[arg(long = "ftProduct", default_value = PROTEIN_NAME, help = "Column for the product attribute")]
    pub product_column: String,

    #[arg(long = "ftGene", default_value = GENE_NAME, help = "Column for the gene attribute")]
    pub gene_column: String,

    // Genome sequence
    #[arg(long = "seq", help = "Genome fasta to include in the output")]
    pub seq: Option<PathBuf>,

    // Verbosity
    #[arg(long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

impl AnnotationCli {
    pub fn config(
        &self,
    ) -> AnnotationConfig {
        AnnotationConfig{
            min_identity: self.min_identity,
            min_length: self.min_length,
            product_column: self.product_column.clone(),
            gene_column: self.gene_column.clone(),
        }
    }
}

/// Parse the command line into `T`, exiting on usage errors.
///
/// Usage errors exit with status 1, `--help` and `--version` with 0.
///
pub fn parse_args<T: CommandFactory + FromArgMatches>(
    about: &'static str,
) -> T {
    let parsed = T::command()
        .about(about)
        .try_get_matches()
        .and_then(|matches| T::from_arg_matches(&matches));

    match parsed {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        },
    }
}

/// Initializes the logger with verbosity given in `log_max_level`.
pub fn init_log(
    log_max_level: usize,
) {
    stderrlog::new()
    .module("flatsift")
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap_or_else(|e| eprintln!("failed to initialize logging: {}", e));
}

/// Log a fatal error and exit with status 1.
///
/// A missing input file also prints the usage of `T`.
///
pub fn exit_with_error<T: CommandFactory>(
    e: E,
) -> ! {
    log::error!("{}", e);
    if e.downcast_ref::<MissingInput>().is_some() {
        let _ = T::command().print_help();
    }
    std::process::exit(1);
}

pub fn run_filter(
    format: Format,
    cli: &FilterCli,
) -> Result<(), E> {
    let mut conn_out = BufWriter::new(std::io::stdout().lock());

    match &cli.command {
        FilterCommands::Taxon { taxon, input_file } => {
            let selection = Selection::Taxon(taxon.clone());
            let conn_in = open_input(input_file)?;
            crate::filter_from_read_to_write(format, &selection, conn_in, &mut conn_out)?;
        },

        FilterCommands::TaxonFile { taxon_list, input_file, out_dir } => {
            let taxa = read_list(taxon_list)?;
            log::info!("read {} taxa from {}", taxa.len(), taxon_list.display());
            let selection = Selection::TaxonSet(taxa);
            let conn_in = open_input(input_file)?;
            std::fs::create_dir_all(out_dir)?;
            crate::split_from_read_by_taxon(format, &selection, conn_in, out_dir)?;
        },

        FilterCommands::Fasta { input_file } => {
            let conn_in = open_input(input_file)?;
            crate::filter_from_read_to_write(format, &Selection::Fasta, conn_in, &mut conn_out)?;
        },

        FilterCommands::Ids { id_list, input_file } => {
            let ids = read_list(id_list)?;
            log::info!("read {} identifiers from {}", ids.len(), id_list.display());
            let selection = Selection::Ids(ids);
            let conn_in = open_input(input_file)?;
            crate::filter_from_read_to_write(format, &selection, conn_in, &mut conn_out)?;
        },
    }

    Ok(())
}

pub fn run_annotation(
    cli: &AnnotationCli,
) -> Result<(), E> {
    let config = cli.config();

    let genome = match &cli.seq {
        Some(path) if !path.exists() => return Err(Box::new(MissingInput{ path: path.clone() })),
        Some(path) => read_genome(path)?,
        None => Vec::new(),
    };

    let mut conn_out = BufWriter::new(std::io::stdout().lock());

    let n_features = match &cli.kaamer_res {
        Some(path) => {
            let lines = LineSource::new(open_input(path)?);
            crate::annotate_from_read_to_write(&config, &genome, lines, &mut conn_out)?
        },
        None => {
            log::info!("reading results from stdin, saving a copy to {}", cli.stream_out.display());
            let side = BufWriter::new(File::create(&cli.stream_out)?);
            let lines = LineSource::with_tee(std::io::stdin().lock(), Box::new(side));
            crate::annotate_from_read_to_write(&config, &genome, lines, &mut conn_out)?
        },
    };
    log::info!("wrote {} features", n_features);

    Ok(())
}
