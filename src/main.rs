use std::process::ExitCode;

fn main() -> ExitCode {
    dotnet_threading::run_cli()
}
