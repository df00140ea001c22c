use std::process::ExitCode;

fn main() -> ExitCode {
    trebuchet::cli::run()
}
