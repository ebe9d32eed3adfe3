use std::process::ExitCode;

fn main() -> ExitCode {
    skelly_cli::run()
}
