//! Normalizer debugging command.

use crate::config::Config;
use crate::normalizer::TitleNormalizer;

/// Print the parsed artist, title and version marker
pub fn cmd_parse(config: &Config, title: &str, artist: Option<&str>) -> anyhow::Result<()> {
    let normalizer = TitleNormalizer::new(&config.normalizer)?;
    let parsed = normalizer.parse(title, artist);

    println!("Artist:  {}", parsed.artist);
    println!("Title:   {}", parsed.title);
    if let Some(tag) = &parsed.version_tag {
        println!("Version: {tag}");
    }
    println!("Display: {}", parsed.format());
    Ok(())
}
