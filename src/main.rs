use docker_update_mgr::{args, run_app, utils::log_utils};

fn main() {
    // Parse command-line arguments
    let args = args::args_checks();
    if let Err(e) = args.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    log_utils::init(args.verbose);

    if let Err(e) = run_app(&args) {
        eprintln!("Application error: {e}");
        std::process::exit(1);
    }
}
