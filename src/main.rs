fn main() {
    if let Err(err) = csv_reconcile::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
