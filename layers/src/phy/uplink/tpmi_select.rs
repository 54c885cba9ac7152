//! PUSCH TPMI selector (SPEC_FULL.md §4.2): TS 38.211 6.3.1.5 codebooks and
//! Gram-matrix/determinant SINR ranking.
//!
//! Grounded on `pusch_tpmi_select.cpp`: codebook tables, the per-layer
//! product/Gram/cofactor pipeline, and the codebook-subset truncation
//! points.

use num_complex::Complex32;

use super::types::{CodebookSubset, PuschTpmiSelectInfo, SrsChannelMatrix, TpmiInfo};

const SQRT1_2: f32 = std::f32::consts::FRAC_1_SQRT_2;
const SQRT1_8: f32 = std::f32::consts::FRAC_1_SQRT_2 / 2.0;
const SQRT1_12: f32 = 0.288_675_13;
const DOT5: f32 = 0.5;
const DOT25: f32 = 0.25;

fn re(v: f32) -> Complex32 {
    Complex32::new(v, 0.0)
}
fn im(v: f32) -> Complex32 {
    Complex32::new(0.0, v)
}
const ZERO: Complex32 = Complex32::new(0.0, 0.0);

/// A candidate precoder, indexed `[layer][tx_port]`.
type PrecodingMatrix = Vec<Vec<Complex32>>;

fn mat(rows: usize, cols: usize, values: &[Complex32]) -> PrecodingMatrix {
    assert_eq!(values.len(), rows * cols);
    values.chunks(cols).map(|row| row.to_vec()).collect()
}

/// TS 38.211 Table 6.3.1.5-1.
fn codebook_1layer_2port() -> Vec<PrecodingMatrix> {
    vec![
        mat(1, 2, &[re(SQRT1_2), ZERO]),
        mat(1, 2, &[ZERO, re(SQRT1_2)]),
        mat(1, 2, &[re(SQRT1_2), re(SQRT1_2)]),
        mat(1, 2, &[re(SQRT1_2), re(-SQRT1_2)]),
        mat(1, 2, &[re(SQRT1_2), im(SQRT1_2)]),
        mat(1, 2, &[re(SQRT1_2), im(-SQRT1_2)]),
    ]
}

/// TS 38.211 Table 6.3.1.5-3.
fn codebook_1layer_4port() -> Vec<PrecodingMatrix> {
    let d = re(DOT5);
    let nd = re(-DOT5);
    let dj = im(DOT5);
    let ndj = im(-DOT5);
    vec![
        mat(1, 4, &[d, ZERO, ZERO, ZERO]),
        mat(1, 4, &[ZERO, d, ZERO, ZERO]),
        mat(1, 4, &[ZERO, ZERO, d, ZERO]),
        mat(1, 4, &[ZERO, ZERO, ZERO, d]),
        mat(1, 4, &[d, ZERO, d, ZERO]),
        mat(1, 4, &[d, ZERO, nd, ZERO]),
        mat(1, 4, &[d, ZERO, dj, ZERO]),
        mat(1, 4, &[d, ZERO, ndj, ZERO]),
        mat(1, 4, &[ZERO, d, ZERO, d]),
        mat(1, 4, &[ZERO, d, ZERO, nd]),
        mat(1, 4, &[ZERO, d, ZERO, dj]),
        mat(1, 4, &[ZERO, d, ZERO, ndj]),
        mat(1, 4, &[d, d, d, d]),
        mat(1, 4, &[d, d, dj, dj]),
        mat(1, 4, &[d, d, nd, nd]),
        mat(1, 4, &[d, d, ndj, ndj]),
        mat(1, 4, &[d, dj, d, dj]),
        mat(1, 4, &[d, dj, dj, nd]),
        mat(1, 4, &[d, dj, nd, ndj]),
        mat(1, 4, &[d, dj, ndj, d]),
        mat(1, 4, &[d, nd, d, nd]),
        mat(1, 4, &[d, nd, dj, ndj]),
        mat(1, 4, &[d, nd, nd, d]),
        mat(1, 4, &[d, nd, ndj, dj]),
        mat(1, 4, &[d, ndj, d, ndj]),
        mat(1, 4, &[d, ndj, dj, d]),
        mat(1, 4, &[d, ndj, nd, dj]),
        mat(1, 4, &[d, ndj, ndj, nd]),
    ]
}

/// TS 38.211 Table 6.3.1.5-4.
fn codebook_2layer_2port() -> Vec<PrecodingMatrix> {
    let d = re(DOT5);
    let nd = re(-DOT5);
    let dj = im(DOT5);
    let ndj = im(-DOT5);
    vec![
        mat(2, 2, &[re(SQRT1_2), ZERO, ZERO, re(SQRT1_2)]),
        mat(2, 2, &[d, d, d, nd]),
        mat(2, 2, &[d, d, dj, ndj]),
    ]
}

/// TS 38.211 Table 6.3.1.5-5.
fn codebook_2layer_4port() -> Vec<PrecodingMatrix> {
    let d = re(DOT5);
    let nd = re(-DOT5);
    let dj = im(DOT5);
    let ndj = im(-DOT5);
    let e = re(SQRT1_8);
    let ne = re(-SQRT1_8);
    let ej = im(SQRT1_8);
    let nej = im(-SQRT1_8);
    vec![
        mat(2, 4, &[d, ZERO, ZERO, d, ZERO, ZERO, ZERO, ZERO]),
        mat(2, 4, &[d, ZERO, ZERO, ZERO, ZERO, d, ZERO, ZERO]),
        mat(2, 4, &[d, ZERO, ZERO, ZERO, ZERO, ZERO, ZERO, d]),
        mat(2, 4, &[ZERO, ZERO, d, ZERO, ZERO, d, ZERO, ZERO]),
        mat(2, 4, &[ZERO, ZERO, d, ZERO, ZERO, ZERO, ZERO, d]),
        mat(2, 4, &[ZERO, ZERO, ZERO, ZERO, d, ZERO, ZERO, d]),
        mat(2, 4, &[d, ZERO, ZERO, d, d, ZERO, ZERO, ndj]),
        mat(2, 4, &[d, ZERO, ZERO, d, d, ZERO, ZERO, dj]),
        mat(2, 4, &[d, ZERO, ZERO, d, ndj, ZERO, ZERO, d]),
        mat(2, 4, &[d, ZERO, ZERO, d, ndj, ZERO, ZERO, nd]),
        mat(2, 4, &[d, ZERO, ZERO, d, nd, ZERO, ZERO, ndj]),
        mat(2, 4, &[d, ZERO, ZERO, d, nd, ZERO, ZERO, dj]),
        mat(2, 4, &[d, ZERO, ZERO, d, dj, ZERO, ZERO, d]),
        mat(2, 4, &[d, ZERO, ZERO, d, dj, ZERO, ZERO, nd]),
        mat(2, 4, &[e, e, e, e, e, ne, e, ne]),
        mat(2, 4, &[e, e, e, e, ej, nej, ej, nej]),
        mat(2, 4, &[e, e, ej, ej, e, ne, ej, nej]),
        mat(2, 4, &[e, e, ej, ej, ej, nej, ne, e]),
        mat(2, 4, &[e, e, ne, ne, e, ne, ne, e]),
        mat(2, 4, &[e, e, ne, ne, ej, nej, nej, ej]),
        mat(2, 4, &[e, e, nej, nej, e, ne, nej, ej]),
        mat(2, 4, &[e, e, nej, nej, ej, nej, e, ne]),
    ]
}

/// TS 38.211 Table 6.3.1.5-6.
fn codebook_3layer_4port() -> Vec<PrecodingMatrix> {
    let d = re(DOT5);
    let nd = re(-DOT5);
    let s = re(SQRT1_12);
    let ns = re(-SQRT1_12);
    let sj = im(SQRT1_12);
    let nsj = im(-SQRT1_12);
    vec![
        mat(3, 4, &[d, ZERO, ZERO, ZERO, d, ZERO, ZERO, ZERO, d, ZERO, ZERO, ZERO]),
        mat(3, 4, &[d, ZERO, ZERO, ZERO, d, ZERO, d, ZERO, ZERO, ZERO, ZERO, d]),
        mat(3, 4, &[d, ZERO, ZERO, ZERO, d, ZERO, nd, ZERO, ZERO, ZERO, ZERO, d]),
        mat(3, 4, &[s, s, s, s, s, ns, s, s, ns, s, ns, ns]),
        mat(3, 4, &[s, s, s, s, ns, s, sj, sj, nsj, sj, nsj, nsj]),
        mat(3, 4, &[s, s, s, ns, s, ns, s, s, ns, ns, s, s]),
        mat(3, 4, &[s, s, s, ns, s, ns, sj, sj, nsj, nsj, sj, sj]),
    ]
}

/// TS 38.211 Table 6.3.1.5-7.
fn codebook_4layer_4port() -> Vec<PrecodingMatrix> {
    let d = re(DOT5);
    let e = re(SQRT1_8);
    let ne = re(-SQRT1_8);
    let ej = im(SQRT1_8);
    let nej = im(-SQRT1_8);
    let q = re(DOT25);
    let nq = re(-DOT25);
    let qj = im(DOT25);
    let nqj = im(-DOT25);
    vec![
        mat(
            4,
            4,
            &[d, ZERO, ZERO, ZERO, ZERO, d, ZERO, ZERO, ZERO, ZERO, d, ZERO, ZERO, ZERO, ZERO, d],
        ),
        mat(
            4,
            4,
            &[e, e, ZERO, ZERO, ZERO, ZERO, e, e, e, ne, ZERO, ZERO, ZERO, ZERO, e, ne],
        ),
        mat(
            4,
            4,
            &[e, e, ZERO, ZERO, ZERO, ZERO, e, e, ej, nej, ZERO, ZERO, ZERO, ZERO, ej, nej],
        ),
        mat(
            4,
            4,
            &[q, q, q, q, q, nq, q, nq, q, q, nq, nq, q, nq, nq, q],
        ),
        mat(
            4,
            4,
            &[q, q, q, nq, q, nq, qj, qj, nqj, qj, nqj, nqj, q, nq, nq, q],
        ),
    ]
}

/// Effective channel H·W, returned as `[layer][rx_port]`.
fn product_channel_weight(h: &SrsChannelMatrix, w: &PrecodingMatrix) -> PrecodingMatrix {
    let nof_layers = w.len();
    let nof_tx_ports = w[0].len();
    let nof_rx_ports = h.nof_rx_ports();
    let mut out = vec![vec![ZERO; nof_rx_ports]; nof_layers];
    for (layer, layer_out) in out.iter_mut().enumerate() {
        for (rx, cell) in layer_out.iter_mut().enumerate() {
            let mut sum = ZERO;
            for tx in 0..nof_tx_ports {
                sum += h.get(rx, tx) * w[layer][tx];
            }
            *cell = sum;
        }
    }
    out
}

/// r×r Gram matrix Wᴴ·Hᴴ·H·W from the effective channel `[layer][rx_port]`.
fn gram_matrix(channel_weights: &PrecodingMatrix) -> Vec<Vec<Complex32>> {
    let nof_layers = channel_weights.len();
    let nof_rx_ports = channel_weights[0].len();
    let mut out = vec![vec![ZERO; nof_layers]; nof_layers];
    for i in 0..nof_layers {
        for j in 0..nof_layers {
            let mut sum = ZERO;
            for k in 0..nof_rx_ports {
                sum += channel_weights[i][k] * channel_weights[j][k].conj();
            }
            out[j][i] = sum;
        }
    }
    out
}

fn minor(m: &[Vec<Complex32>], skip_row: usize, skip_col: usize) -> Vec<Vec<Complex32>> {
    m.iter()
        .enumerate()
        .filter(|(r, _)| *r != skip_row)
        .map(|(_, row)| row.iter().enumerate().filter(|(c, _)| *c != skip_col).map(|(_, v)| *v).collect())
        .collect()
}

/// Determinant via cofactor expansion; specialised for sizes 1-3, generic
/// recursive expansion above that (sizes up to 4 are all this crate needs).
fn determinant(m: &[Vec<Complex32>]) -> Complex32 {
    match m.len() {
        1 => m[0][0],
        2 => m[0][0] * m[1][1] - m[0][1] * m[1][0],
        3 => {
            m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) + m[0][1] * (m[1][2] * m[2][0] - m[2][2] * m[1][0])
                + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
        }
        n => {
            let mut sum = ZERO;
            let mut sign = 1.0f32;
            for i in 0..n {
                let sub = minor(m, 0, i);
                sum += m[0][i] * determinant(&sub) * sign;
                sign = -sign;
            }
            sum
        }
    }
}

/// Per-layer SINR from the Gram matrix: `SINR_k = 1 / (σ² · (G⁻¹)_kk) − 1`.
fn calculate_mean_layer_sinr(channel_weights: &PrecodingMatrix, noise_variance: f32) -> Vec<f32> {
    let nof_layers = channel_weights.len();
    let mut gram = gram_matrix(channel_weights);
    for i in 0..nof_layers {
        gram[i][i] += re(noise_variance);
    }
    let det = determinant(&gram).re;

    (0..nof_layers)
        .map(|i| {
            let sub = minor(&gram, i, i);
            let inv_diagonal = determinant(&sub).re / det;
            1.0 / (inv_diagonal * noise_variance) - 1.0
        })
        .collect()
}

fn to_db(linear: f32) -> f32 {
    10.0 * linear.max(f32::MIN_POSITIVE).log10()
}

fn get_tpmi_select_info_1layer(channel: &SrsChannelMatrix, noise_variance: f32, subset: CodebookSubset) -> (TpmiInfo, Vec<f32>) {
    let nof_rx_ports = channel.nof_rx_ports();
    let nof_tx_ports = channel.nof_tx_ports();

    let (codebook, tpmi_end) = if nof_tx_ports == 2 {
        let cb = codebook_1layer_2port();
        let end = match subset {
            CodebookSubset::FullyAndPartialAndNonCoherent | CodebookSubset::PartialAndNonCoherent => cb.len(),
            CodebookSubset::NonCoherent => 2,
        };
        (cb, end)
    } else {
        let cb = codebook_1layer_4port();
        let end = match subset {
            CodebookSubset::FullyAndPartialAndNonCoherent => cb.len(),
            CodebookSubset::PartialAndNonCoherent => 12,
            CodebookSubset::NonCoherent => 4,
        };
        (cb, end)
    };

    let mut best_sinr = f32::NEG_INFINITY;
    let mut best_tpmi = 0u32;
    for (tpmi, weights) in codebook.iter().enumerate().take(tpmi_end) {
        let mut signal_power = 0.0f32;
        for rx in 0..nof_rx_ports {
            let mut sum = ZERO;
            for tx in 0..nof_tx_ports {
                sum += channel.get(rx, tx) * weights[0][tx];
            }
            signal_power += sum.norm_sqr();
        }
        let sinr = signal_power / noise_variance;
        if sinr > best_sinr {
            best_sinr = sinr;
            best_tpmi = tpmi as u32;
        }
    }

    let sinr_db = to_db(best_sinr);
    (TpmiInfo { tpmi: best_tpmi, avg_sinr_db: sinr_db }, vec![sinr_db])
}

fn select_best_layered(
    codebook: &[PrecodingMatrix],
    tpmi_end: usize,
    channel: &SrsChannelMatrix,
    noise_variance: f32,
) -> (u32, Vec<f32>) {
    let mut best_avg = f32::NEG_INFINITY;
    let mut best_tpmi = 0u32;
    let mut best_layer_sinr = Vec::new();
    for (tpmi, weights) in codebook.iter().enumerate().take(tpmi_end) {
        let channel_weights = product_channel_weight(channel, weights);
        let layer_sinr = calculate_mean_layer_sinr(&channel_weights, noise_variance);
        let avg = layer_sinr.iter().sum::<f32>() / layer_sinr.len() as f32;
        if avg > best_avg {
            best_avg = avg;
            best_tpmi = tpmi as u32;
            best_layer_sinr = layer_sinr;
        }
    }
    let layer_sinr_db: Vec<f32> = best_layer_sinr.into_iter().map(to_db).collect();
    (best_tpmi, layer_sinr_db)
}

fn get_tpmi_select_info_2layer(channel: &SrsChannelMatrix, noise_variance: f32, subset: CodebookSubset) -> (TpmiInfo, Vec<f32>) {
    let nof_tx_ports = channel.nof_tx_ports();
    let (codebook, tpmi_end) = if nof_tx_ports == 2 {
        let cb = codebook_2layer_2port();
        let end = match subset {
            CodebookSubset::FullyAndPartialAndNonCoherent | CodebookSubset::PartialAndNonCoherent => cb.len(),
            CodebookSubset::NonCoherent => 1,
        };
        (cb, end)
    } else {
        let cb = codebook_2layer_4port();
        let end = match subset {
            CodebookSubset::FullyAndPartialAndNonCoherent => cb.len(),
            CodebookSubset::PartialAndNonCoherent => 14,
            CodebookSubset::NonCoherent => 6,
        };
        (cb, end)
    };
    let (best_tpmi, layer_sinr_db) = select_best_layered(&codebook, tpmi_end, channel, noise_variance);
    let avg = layer_sinr_db.iter().sum::<f32>() / layer_sinr_db.len() as f32;
    (TpmiInfo { tpmi: best_tpmi, avg_sinr_db: avg }, layer_sinr_db)
}

fn get_tpmi_select_info_3layer(channel: &SrsChannelMatrix, noise_variance: f32, subset: CodebookSubset) -> (TpmiInfo, Vec<f32>) {
    let cb = codebook_3layer_4port();
    let tpmi_end = match subset {
        CodebookSubset::FullyAndPartialAndNonCoherent => cb.len(),
        CodebookSubset::PartialAndNonCoherent => 3,
        CodebookSubset::NonCoherent => 1,
    };
    let (best_tpmi, layer_sinr_db) = select_best_layered(&cb, tpmi_end, channel, noise_variance);
    let avg = layer_sinr_db.iter().sum::<f32>() / layer_sinr_db.len() as f32;
    (TpmiInfo { tpmi: best_tpmi, avg_sinr_db: avg }, layer_sinr_db)
}

fn get_tpmi_select_info_4layer(channel: &SrsChannelMatrix, noise_variance: f32, subset: CodebookSubset) -> (TpmiInfo, Vec<f32>) {
    let cb = codebook_4layer_4port();
    let tpmi_end = match subset {
        CodebookSubset::FullyAndPartialAndNonCoherent => cb.len(),
        CodebookSubset::PartialAndNonCoherent => 3,
        CodebookSubset::NonCoherent => 1,
    };
    let (best_tpmi, layer_sinr_db) = select_best_layered(&cb, tpmi_end, channel, noise_variance);
    let avg = layer_sinr_db.iter().sum::<f32>() / layer_sinr_db.len() as f32;
    (TpmiInfo { tpmi: best_tpmi, avg_sinr_db: avg }, layer_sinr_db)
}

/// `get_tpmi_select_info(H, σ², max_rank, codebook_subset) → info` (§4.2).
pub fn get_tpmi_select_info(
    channel: &SrsChannelMatrix,
    noise_variance: f32,
    max_rank: usize,
    codebook_subset: CodebookSubset,
) -> PuschTpmiSelectInfo {
    let max_nof_layers = channel.nof_tx_ports().min(channel.nof_rx_ports()).min(max_rank);

    let mut per_layer_count = Vec::new();
    let mut per_layer_sinr_db = Vec::new();

    if max_nof_layers >= 1 {
        let (info, sinr) = get_tpmi_select_info_1layer(channel, noise_variance, codebook_subset);
        per_layer_count.push(info);
        per_layer_sinr_db.push(sinr);
    }
    if max_nof_layers >= 2 {
        let (info, sinr) = get_tpmi_select_info_2layer(channel, noise_variance, codebook_subset);
        per_layer_count.push(info);
        per_layer_sinr_db.push(sinr);
    }
    if max_nof_layers >= 3 && channel.nof_tx_ports() == 4 && channel.nof_rx_ports() == 4 {
        let (info, sinr) = get_tpmi_select_info_3layer(channel, noise_variance, codebook_subset);
        per_layer_count.push(info);
        per_layer_sinr_db.push(sinr);
    }
    if max_nof_layers >= 4 && channel.nof_tx_ports() == 4 && channel.nof_rx_ports() == 4 {
        let (info, sinr) = get_tpmi_select_info_4layer(channel, noise_variance, codebook_subset);
        per_layer_count.push(info);
        per_layer_sinr_db.push(sinr);
    }

    PuschTpmiSelectInfo::new(per_layer_count, per_layer_sinr_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_channel(nof_rx: usize, nof_tx: usize, gain: f32) -> SrsChannelMatrix {
        let mut m = SrsChannelMatrix::new(nof_rx, nof_tx);
        for i in 0..nof_rx.min(nof_tx) {
            m.set(i, i, re(gain));
        }
        m
    }

    #[test]
    fn codebook_tables_have_documented_sizes() {
        assert_eq!(codebook_1layer_2port().len(), 6);
        assert_eq!(codebook_1layer_4port().len(), 28);
        assert_eq!(codebook_2layer_2port().len(), 3);
        assert_eq!(codebook_2layer_4port().len(), 22);
        assert_eq!(codebook_3layer_4port().len(), 7);
        assert_eq!(codebook_4layer_4port().len(), 5);
    }

    #[test]
    fn codebook_coverage_2port_unrestricted() {
        let h = diagonal_channel(2, 2, 1.0);
        let info = get_tpmi_select_info(&h, 0.01, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        let sel = info.get_tpmi_select(1).unwrap();
        assert!((0..=5).contains(&sel.tpmi));
    }

    #[test]
    fn codebook_coverage_2port_non_coherent() {
        let h = diagonal_channel(2, 2, 1.0);
        let info = get_tpmi_select_info(&h, 0.01, 4, CodebookSubset::NonCoherent);
        let sel = info.get_tpmi_select(1).unwrap();
        assert!((0..=1).contains(&sel.tpmi));
    }

    #[test]
    fn tpmi_idempotent_under_positive_scaling() {
        let h = diagonal_channel(2, 2, 1.0);
        let mut scaled = h.clone();
        scaled.scale(3.0);

        let base = get_tpmi_select_info(&h, 0.01, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        let scaled_info = get_tpmi_select_info(&scaled, 0.01 * 9.0, 4, CodebookSubset::FullyAndPartialAndNonCoherent);

        assert_eq!(base.get_tpmi_select(1).unwrap().tpmi, scaled_info.get_tpmi_select(1).unwrap().tpmi);
        assert_eq!(base.get_tpmi_select(2).unwrap().tpmi, scaled_info.get_tpmi_select(2).unwrap().tpmi);
    }

    #[test]
    fn four_port_layer_counts_are_gated_on_both_port_counts() {
        let h = diagonal_channel(2, 4, 1.0);
        let info = get_tpmi_select_info(&h, 0.01, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        assert_eq!(info.get_max_nof_layers(), 2, "3/4 layer require 4 rx ports too");
    }

    #[test]
    fn determinant_matches_closed_form_for_size_2() {
        let m = vec![vec![re(4.0), re(1.0)], vec![re(2.0), re(3.0)]];
        assert_eq!(determinant(&m), re(10.0));
    }
}
