use std::path::Path;

use anyhow::bail;
use devprov_core::DevprovConfig;

pub fn init(config_path: &Path, db_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    let config = DevprovConfig::scaffold(db_path);
    std::fs::write(config_path, config.to_toml_string()?)?;
    println!("✓ Generated {}", config_path.display());
    Ok(())
}
