use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FragmentLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("QM energy file '{path}' contains no energies")]
    Empty { path: String },
}

#[derive(Debug, Deserialize)]
struct QmEnergyRecord {
    energy: f64,
}

/// A small molecule with a QM torsion scan used as fitting data.
///
/// `topology` is opaque to this crate; it is handed back to the energy
/// evaluator on every evaluation.
#[derive(Debug, Clone)]
pub struct Fragment<S = ()> {
    pub residue_name: String,
    pub topology: S,
    /// QM reference energies in kJ/mol, one per scanned conformation.
    pub qm_energy: Vec<f64>,
    /// MM energies in kJ/mol from the most recent evaluation. Overwritten, never appended.
    pub mm_energy: Vec<f64>,
}

impl<S> Fragment<S> {
    pub fn new(residue_name: &str, topology: S, qm_energy: Vec<f64>) -> Self {
        Self {
            residue_name: residue_name.to_string(),
            topology,
            qm_energy,
            mm_energy: Vec::new(),
        }
    }

    pub fn num_conformations(&self) -> usize {
        self.qm_energy.len()
    }
}

impl Fragment<()> {
    pub fn from_qm_energies(residue_name: &str, qm_energy: Vec<f64>) -> Self {
        Self::new(residue_name, (), qm_energy)
    }
}

/// Reads QM scan energies from a CSV file with an `energy` column.
/// Other columns (e.g. the scan angle) are ignored.
pub fn load_qm_energies_csv(path: &Path) -> Result<Vec<f64>, FragmentLoadError> {
    let path_str = || path.to_string_lossy().to_string();
    if !path.exists() {
        return Err(FragmentLoadError::Io {
            path: path_str(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        });
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| FragmentLoadError::Csv {
        path: path_str(),
        source: e,
    })?;

    let mut energies = Vec::new();
    for result in reader.deserialize::<QmEnergyRecord>() {
        let record = result.map_err(|e| FragmentLoadError::Csv {
            path: path_str(),
            source: e,
        })?;
        energies.push(record.energy);
    }

    if energies.is_empty() {
        return Err(FragmentLoadError::Empty { path: path_str() });
    }
    Ok(energies)
}
