// src/main.rs

use std::path::Path;
use std::process;

use workpanel::{cli, exit_codes, logging, workflow};

fn main() {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level, Path::new(workpanel::engine::LOGS_DIR))
    {
        eprintln!("warning: failed to initialise logging: {err}");
    }

    let spec = match workflow::load(&args.workflow) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("error: failed to load workflow '{}': {err}", args.workflow.display());
            process::exit(exit_codes::LOAD_ERROR);
        }
    };

    if let Some(out_path) = &args.to_yaml {
        match workflow::yaml::write_yaml(&spec, out_path) {
            Ok(()) => {
                println!("wrote {}", out_path.display());
                process::exit(exit_codes::OK);
            }
            Err(err) => {
                eprintln!("error: failed to write YAML to '{}': {err}", out_path.display());
                process::exit(exit_codes::LOAD_ERROR);
            }
        }
    }

    match workpanel::run(spec, &args) {
        Ok(()) => process::exit(exit_codes::OK),
        Err(err) => {
            eprintln!("unexpected runtime error: {err}");
            process::exit(exit_codes::RUNTIME_ERROR);
        }
    }
}
