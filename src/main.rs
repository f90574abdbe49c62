#[tokio::main]
async fn main() {
    if let Err(e) = eventlink_core::run().await {
        eprintln!("eventlink failed: {}", e);
        std::process::exit(1);
    }
}
