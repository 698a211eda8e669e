//! Combinatorial entropy terms shared by every state variant.
//!
//! Integer arguments below `CACHE_SIZE` are served from lazily built tables;
//! larger arguments fall back to direct evaluation. Degenerate inputs
//! (empty blocks, zero counts) yield `0.0` instead of NaN.

use std::f64::consts::{LN_2, PI};
use std::sync::OnceLock;

use special::Gamma;

const CACHE_SIZE: usize = 1 << 16;
const Q_CACHE: usize = 512;

fn lgamma_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        (0..CACHE_SIZE)
            .map(|n| if n == 0 { f64::INFINITY } else { lgamma(n as f64) })
            .collect()
    })
}

fn xlogx_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| (0..CACHE_SIZE).map(|n| xlogx_f(n as f64)).collect())
}

fn log_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| (0..CACHE_SIZE).map(|n| safelog_f(n as f64)).collect())
}

/// Natural log of the gamma function.
#[inline]
pub fn lgamma(x: f64) -> f64 {
    Gamma::ln_gamma(x).0
}

/// `lgamma(n)` for integer `n`, cached for small arguments.
#[inline]
pub fn lgamma_int(n: i64) -> f64 {
    if n > 0 && (n as usize) < CACHE_SIZE {
        lgamma_table()[n as usize]
    } else {
        lgamma(n as f64)
    }
}

/// `ln(x)`, with `ln(0)` defined as zero.
#[inline]
pub fn safelog_f(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x.ln()
    }
}

/// Integer variant of [`safelog_f`].
#[inline]
pub fn safelog(n: i64) -> f64 {
    if n >= 0 && (n as usize) < CACHE_SIZE {
        log_table()[n as usize]
    } else {
        safelog_f(n as f64)
    }
}

/// `x ln x`, with the limit `0` at `x = 0`.
#[inline]
pub fn xlogx_f(x: f64) -> f64 {
    x * safelog_f(x)
}

/// Integer variant of [`xlogx_f`].
#[inline]
pub fn xlogx(n: i64) -> f64 {
    if n >= 0 && (n as usize) < CACHE_SIZE {
        xlogx_table()[n as usize]
    } else {
        xlogx_f(n as f64)
    }
}

/// Log binomial coefficient; zero whenever `n <= 0`, `k <= 0` or `k >= n`.
#[inline]
pub fn lbinom(n: i64, k: i64) -> f64 {
    if n <= 0 || k <= 0 || k >= n {
        return 0.0;
    }
    lgamma_int(n + 1) - lgamma_int(k + 1) - lgamma_int(n - k + 1)
}

/// Numerically stable `ln(e^a + e^b)`.
#[inline]
pub fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Poisson-approximated edge term of block pair `(r, s)`.
#[inline]
pub fn eterm(r: usize, s: usize, mrs: i64, directed: bool) -> f64 {
    if directed || r != s {
        -xlogx(mrs)
    } else {
        -xlogx(2 * mrs) / 2.0
    }
}

/// Poisson-approximated vertex term of one block.
#[inline]
pub fn vterm(mrp: i64, mrm: i64, wr: i64, deg_corr: bool, directed: bool) -> f64 {
    match (deg_corr, directed) {
        (true, true) => xlogx(mrp) + xlogx(mrm),
        (true, false) => xlogx(mrp),
        (false, true) => (mrp + mrm) as f64 * safelog(wr),
        (false, false) => mrp as f64 * safelog(wr),
    }
}

/// Microcanonical edge term of block pair `(r, s)`.
#[inline]
pub fn eterm_exact(r: usize, s: usize, mrs: i64, directed: bool) -> f64 {
    let val = lgamma_int(mrs + 1);
    if directed || r != s {
        -val
    } else {
        -val - mrs as f64 * LN_2
    }
}

/// Microcanonical vertex term of one block.
#[inline]
pub fn vterm_exact(mrp: i64, mrm: i64, wr: i64, deg_corr: bool, directed: bool) -> f64 {
    match (deg_corr, directed) {
        (true, true) => lgamma_int(mrp + 1) + lgamma_int(mrm + 1),
        (true, false) => lgamma_int(mrp + 1),
        (false, true) => (mrp + mrm) as f64 * safelog(wr),
        (false, false) => mrp as f64 * safelog(wr),
    }
}

/// Dense-ensemble term of block pair `(r, s)` holding `ers` edges between
/// blocks of sizes `wr` and `ws`.
pub fn eterm_dense(
    r: usize,
    s: usize,
    ers: i64,
    wr: i64,
    ws: i64,
    multigraph: bool,
    directed: bool,
) -> f64 {
    if ers == 0 {
        return 0.0;
    }
    let nrns = if r != s || directed {
        wr * ws
    } else if multigraph {
        wr * (wr + 1) / 2
    } else {
        wr * (wr - 1) / 2
    };
    if multigraph {
        lbinom(nrns + ers - 1, ers)
    } else {
        lbinom(nrns, ers)
    }
}

/// Parallel-edge correction of a vertex pair joined by `m` edges; undirected
/// self-loops also pay for their orientation.
#[inline]
pub fn parallel_term(m: i64, undirected_loop: bool) -> f64 {
    if undirected_loop {
        if m > 0 {
            lgamma_int(m + 1) + m as f64 * LN_2
        } else {
            0.0
        }
    } else if m > 1 {
        lgamma_int(m + 1)
    } else {
        0.0
    }
}

/// Description length of the block-pair edge counts given `b` blocks and
/// `e` edges.
pub fn edges_dl(b: usize, e: i64, directed: bool) -> f64 {
    let b = b as i64;
    let bb = if directed { b * b } else { b * (b + 1) / 2 };
    lbinom(bb + e - 1, e)
}

fn q_table() -> &'static [Vec<f64>] {
    static TABLE: OnceLock<Vec<Vec<f64>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(Q_CACHE + 1);
        rows.push(vec![0.0]);
        for n in 1..=Q_CACHE {
            let mut row = vec![f64::NEG_INFINITY; n + 1];
            for k in 1..=n {
                let rest = n - k;
                let with_part = rows[rest][k.min(rest)];
                row[k] = log_sum_exp(row[k - 1], with_part);
            }
            rows.push(row);
        }
        rows
    })
}

fn log_q_approx(n: i64, k: i64) -> f64 {
    let (nf, kf) = (n as f64, k as f64);
    if kf < nf.powf(0.25) {
        return lbinom(n - 1, k - 1) - lgamma_int(k + 1);
    }
    let c = PI * (2.0f64 / 3.0).sqrt();
    let mut s = c * nf.sqrt() - (4.0 * 3.0f64.sqrt() * nf).ln();
    if k < n {
        let x = kf / nf.sqrt() - nf.ln() / c;
        s -= (2.0 / c) * (-c * x / 2.0).exp();
    }
    s
}

/// Log of the number of partitions of `n` into at most `k` parts.
pub fn log_q(n: i64, k: i64) -> f64 {
    if n <= 0 || k < 1 {
        return 0.0;
    }
    let k = k.min(n);
    if (n as usize) <= Q_CACHE {
        q_table()[n as usize][k as usize]
    } else {
        log_q_approx(n, k)
    }
}
