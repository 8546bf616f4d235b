fn main() {
    if let Err(err) = hubchat::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
