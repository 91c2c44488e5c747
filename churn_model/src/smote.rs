//! Synthetic minority oversampling for the training split

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

/// Oversample the minority class until both classes have the same size.
///
/// Each synthetic row lies on the segment between a minority row and one of
/// its `k` nearest minority neighbours (Euclidean). When the minority class
/// has fewer than two rows the input is returned unchanged.
pub fn oversample(
    rows: &[Vec<f64>],
    labels: &[u8],
    k: usize,
    seed: u64,
) -> (Vec<Vec<f64>>, Vec<u8>) {
    let positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 1).collect();
    let negatives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] != 1).collect();

    let needed = positives.len().abs_diff(negatives.len());
    let (minority, minority_label) = if positives.len() < negatives.len() {
        (positives, 1u8)
    } else {
        (negatives, 0u8)
    };

    let mut out_rows = rows.to_vec();
    let mut out_labels = labels.to_vec();

    if needed == 0 {
        return (out_rows, out_labels);
    }
    if minority.len() < 2 {
        warn!(
            minority = minority.len(),
            "Too few minority rows for oversampling, skipping"
        );
        return (out_rows, out_labels);
    }

    let k = k.clamp(1, minority.len() - 1);
    let neighbours: Vec<Vec<usize>> = minority
        .iter()
        .map(|&i| nearest(rows, &minority, i, k))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..needed {
        let pick = rng.gen_range(0..minority.len());
        let base = &rows[minority[pick]];
        let neighbour = &rows[neighbours[pick][rng.gen_range(0..k)]];
        let gap: f64 = rng.gen();

        let synthetic = base
            .iter()
            .zip(neighbour)
            .map(|(b, n)| b + gap * (n - b))
            .collect();
        out_rows.push(synthetic);
        out_labels.push(minority_label);
    }

    debug!(synthetic = needed, k, "Oversampled minority class");
    (out_rows, out_labels)
}

/// The `k` nearest rows to `target` among `candidates`, excluding itself
fn nearest(rows: &[Vec<f64>], candidates: &[usize], target: usize, k: usize) -> Vec<usize> {
    let mut distances: Vec<(f64, usize)> = candidates
        .iter()
        .filter(|&&c| c != target)
        .map(|&c| {
            let d: f64 = rows[c]
                .iter()
                .zip(&rows[target])
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            (d, c)
        })
        .collect();

    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    distances.into_iter().take(k).map(|(_, c)| c).collect()
}
