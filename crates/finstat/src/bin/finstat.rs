//! finstat - Statistics over personal finance ledgers.

fn main() -> std::process::ExitCode {
    finstat::cmd::stats_cmd::main()
}
