//! dupgroup - group files by an ordered chain of filters.
//!
//! Entry point for the dupgroup CLI.

use dupgroup::cli::Cli;
use dupgroup::error::{ExitCode, StructuredError};
use dupgroup::grouping::GroupingError;

fn main() {
    let cli = Cli::parse_ordered();
    let json_errors = cli.json_errors;

    match dupgroup::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = if err
                .downcast_ref::<GroupingError>()
                .is_some_and(|e| matches!(e, GroupingError::Interrupted))
            {
                ExitCode::Interrupted
            } else {
                ExitCode::GeneralError
            };

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                match serde_json::to_string_pretty(&structured) {
                    Ok(json) => eprintln!("{}", json),
                    Err(_) => eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err),
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
