use anyhow::{Context, Result};

use std::path::Path;
use std::process::Command;

const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"mif1", b"msf1", b"heif"];

/// HEIC/HEIF detection by extension or by the ISO-BMFF `ftyp` major brand.
pub fn is_heif(path: &Path, data: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ext == "heic" || ext == "heif");

    by_extension
        || (data.len() >= 12
            && &data[4..8] == b"ftyp"
            && HEIF_BRANDS.iter().any(|brand| &data[8..12] == *brand))
}

/// Converts a HEIC/HEIF file to PNG bytes using libheif's `heif-convert`
pub fn convert_to_png(path: &Path) -> Result<Vec<u8>> {
    if !is_heif_convert_available() {
        anyhow::bail!("heif-convert is not found in PATH. Install libheif to load HEIC images.");
    }

    let dir = tempfile::tempdir().context("Failed to create temporary directory")?;
    let output_path = dir.path().join("converted.png");

    let output = Command::new("heif-convert")
        .arg(path)
        .arg(&output_path)
        .output()
        .context("Failed to execute heif-convert")?;

    if !output.status.success() {
        let code = output.status.code();
        anyhow::bail!(
            "heif-convert failed with code {:?}: {}",
            code,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let bytes = std::fs::read(&output_path).context(format!(
        "heif-convert produced no output at {}",
        output_path.display()
    ))?;

    log::debug!("Converted HEIF {} ({} bytes of PNG)", path.display(), bytes.len());

    Ok(bytes)
}

pub fn is_heif_convert_available() -> bool {
    Command::new("heif-convert").arg("--version").output().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert!(is_heif(Path::new("IMG_0001.HEIC"), &[]));
        assert!(is_heif(Path::new("photo.heif"), &[]));
        assert!(!is_heif(Path::new("photo.jpg"), &[]));
    }

    #[test]
    fn detects_by_brand() {
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0; 12]);
        assert!(is_heif(Path::new("renamed.bin"), &data));

        let mut mp4 = vec![0, 0, 0, 24];
        mp4.extend_from_slice(b"ftypisom");
        assert!(!is_heif(Path::new("clip.bin"), &mp4));
    }
}
