//! Reading and writing instrument document files

use nexcon_core::Instrument;
use std::path::Path;

/// Load a JSON document and rebuild its dependency registry
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid document.
pub fn load(path: &Path) -> Result<Instrument, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(Instrument::from_json(&text)?)
}

/// # Errors
///
/// Returns an error if the document cannot be encoded or written.
pub fn save(instrument: &Instrument, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, instrument.to_json()?)?;
    Ok(())
}
