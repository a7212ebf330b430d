fn main() -> std::process::ExitCode {
    wireless_adb_lib::run()
}
