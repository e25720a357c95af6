//! Small filesystem helpers shared across the binary.

use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory and all missing parents if it does not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        tracing::info!("Created directory: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_creates_nested_path() {
        let base = std::env::temp_dir().join(format!("drivedesk-test-{}", uuid::Uuid::new_v4()));
        let nested = base.join("a").join("b");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Calling again on an existing directory is a no-op
        ensure_dir(&nested).unwrap();

        let _ = std::fs::remove_dir_all(&base);
    }
}
