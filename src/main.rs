fn main() {
    if let Err(err) = key_matcher::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
