fn main() {
    if let Err(error) = quarry_cli::run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
