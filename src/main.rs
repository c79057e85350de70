fn main() -> std::process::ExitCode {
    csv_sql_loader_lib::run()
}
