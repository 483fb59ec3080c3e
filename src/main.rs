#[tokio::main]
async fn main() -> anyhow::Result<()> {
    input_replay::run().await
}
