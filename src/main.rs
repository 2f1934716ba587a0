fn main() {
    if let Err(err) = evergy_home_api::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
