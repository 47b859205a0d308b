#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rpi_thermometer::client().await
}
