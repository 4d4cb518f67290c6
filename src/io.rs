//! Optional export of finished chains to CSV (feature `csv`).

#[cfg(feature = "csv")]
use std::error::Error as StdError;
#[cfg(feature = "csv")]
use std::fs::File;

#[cfg(feature = "csv")]
use csv::Writer;

#[cfg(feature = "csv")]
use crate::geometry::Geometry;
#[cfg(feature = "csv")]
use crate::samples::Samples;

#[cfg(feature = "csv")]
/// Saves one or more chains as a CSV file.
///
/// The file has a header row `chain,sample,dim_0,...,dim_{d-1}` followed by
/// one row per retained state, labelled with its chain index and its position
/// within the chain.
///
/// # Examples
///
/// ```rust
/// # use ndarray::Array2;
/// # use pde_bayes::geometry::Discrete;
/// # use pde_bayes::io::save_csv;
/// # use pde_bayes::samples::Samples;
/// let chain = Samples::new(Array2::zeros((2, 1)), 1.0, Discrete::new(1));
/// save_csv(&[chain], "/tmp/chain.csv")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn save_csv<G: Geometry>(
    chains: &[Samples<G>],
    filename: &str,
) -> Result<(), Box<dyn StdError>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let num_dimensions = chains.first().map_or(0, Samples::dim);
    let mut header: Vec<String> = vec!["chain".to_string(), "sample".to_string()];
    header.extend((0..num_dimensions).map(|i| format!("dim_{}", i)));
    wtr.write_record(&header)?;

    for (chain_idx, chain) in chains.iter().enumerate() {
        for (sample_idx, state) in chain.data().rows().into_iter().enumerate() {
            let mut row = vec![chain_idx.to_string(), sample_idx.to_string()];
            row.extend(state.iter().map(|v| v.to_string()));
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(all(test, feature = "csv"))]
mod tests {
    use super::*;
    use crate::geometry::Discrete;
    use ndarray::Array2;

    #[test]
    fn csv_layout_has_one_row_per_state_plus_header() {
        let data = Array2::from_shape_fn((3, 2), |(i, j)| (i * 2 + j) as f64);
        let chains = vec![
            Samples::new(data.clone(), 1.0, Discrete::new(2)),
            Samples::new(data, 0.5, Discrete::new(2)),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.csv");
        save_csv(&chains, path.to_str().unwrap()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 3);
        assert_eq!(lines[0], "chain,sample,dim_0,dim_1");
        assert_eq!(lines[1], "0,0,0,1");
        assert_eq!(lines[4], "1,0,0,1");
    }
}
