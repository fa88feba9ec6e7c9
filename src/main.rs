fn main() {
    if let Err(err) = registry_canon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
