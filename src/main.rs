fn main() -> anyhow::Result<()> {
    shopfront::run()?;
    Ok(())
}
