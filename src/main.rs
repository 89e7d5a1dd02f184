#[tokio::main]
async fn main() {
    xrtest::cli::run().await;
}
