use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    shopdb::cli::run().await?;
    Ok(())
}
