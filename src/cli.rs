use std::path::PathBuf;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    Command,
};

use crate::{
    config::Config,
    utils::{init_log, LogLevel},
};

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .author(crate_authors!())
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output-file")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Set summary output file [default: <stdout>]"),
        )
        .arg(
            Arg::new("annotation_file")
                .value_parser(value_parser!(PathBuf))
                .value_name("ANNOTATION_BED")
                .required(true)
                .help("BED file from mapping mature.fa to hairpin.fa (mature arm coordinates on each hairpin)"),
        )
        .arg(
            Arg::new("reads_file")
                .value_parser(value_parser!(PathBuf))
                .value_name("READS_BED")
                .required(true)
                .help("BED file from mapping the library of interest to hairpin.fa"),
        )
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line.  Usage problems print to stderr and
    // exit with status 1; --help and --version keep clap's normal behaviour
    let m = match cli_model().try_get_matches() {
        Ok(m) => m,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1)
        }
        Err(e) => e.exit(),
    };

    // Setup logging
    init_log(&m);

    debug!("Processing command line options");

    let anno_file = m
        .get_one::<PathBuf>("annotation_file")
        .expect("Missing annotation file")
        .clone();

    let reads_file = m
        .get_one::<PathBuf>("reads_file")
        .expect("Missing reads file")
        .clone();

    let output = m.get_one::<PathBuf>("output").map(|p| p.to_owned());

    Ok(Config::new(anno_file, reads_file, output))
}
