use std::process::ExitCode;

fn main() -> ExitCode {
    sakan_cli::run()
}
