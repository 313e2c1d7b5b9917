use std::path::PathBuf;

pub async fn resolve(text: &str) -> anyhow::Result<()> {
    let placeholders = super::git_placeholders(&PathBuf::from("."));
    let resolved = placeholders.resolve(text, &[])?;
    println!("{resolved}");
    Ok(())
}
