#[tokio::main]
async fn main() -> anyhow::Result<()> {
    playlist_backup::logging::init();
    playlist_backup::run().await
}
