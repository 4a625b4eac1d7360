fn main() {
    use clap::Parser;
    use mangapdf::logging::{self, Verbosity};
    use std::error::Error;
    let args = mangapdf::cli::Args::parse();
    if let Err(e) = logging::init(Verbosity::from_flags(args.quiet, args.verbose)) {
        eprintln!("Warning: {:#}", e);
    }
    if let Err(e) = mangapdf::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
