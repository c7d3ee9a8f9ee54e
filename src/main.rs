#[tokio::main]
async fn main() -> anyhow::Result<()> {
    care_advisor::cli::run().await
}
