//! `qpkg_encrypt <filename>`: stamps the size tag into a package trailer.
//! Exit codes: 0 ok, 1 usage, 2 missing file, 3 invalid package,
//! 4 `--verify` mismatch.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use qpkg_encrypt_rs::cli::{execute, usage, Cli, Outcome, USAGE_EXIT};
use qpkg_encrypt_rs::logging::init_logging;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return reject_arguments(err),
    };
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(Outcome::Sealed(_)) => ExitCode::SUCCESS,
        Ok(Outcome::Info(report)) => {
            println!("{report:#}");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Verified(verification)) => {
            println!("{}: tag {} ok", cli.filename.display(), verification.expected);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn reject_arguments(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        _ => {
            eprint!("{err}");
            println!("{}", usage());
            ExitCode::from(USAGE_EXIT)
        }
    }
}
