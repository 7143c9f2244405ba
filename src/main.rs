fn main() {
    if let Err(err) = cardset::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
