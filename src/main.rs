fn main() -> anyhow::Result<()> {
    pinshot::run(std::env::args().collect())?;
    Ok(())
}
