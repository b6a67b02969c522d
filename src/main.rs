use std::process::ExitCode;

fn main() -> ExitCode {
    match macro_tracker::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mtrack: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
