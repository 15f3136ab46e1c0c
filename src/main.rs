#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = prepline::run().await {
        eprintln!("prepline fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
