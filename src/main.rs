fn main() {
    env_logger::init();

    if let Err(err) = firefly::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
