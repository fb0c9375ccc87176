fn main() -> std::process::ExitCode {
    aiva_lib::run()
}
