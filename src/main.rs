#[tokio::main]
async fn main() {
    if let Err(err) = asvz_sniper::run().await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
