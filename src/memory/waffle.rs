use super::aggregate::GpuUsage;

/// Integer cell counts per category on an n×n waffle grid. Always sums to
/// exactly `n²`; see [`map_bytes_to_waffle_cells`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaffleCells {
    pub weights: u32,
    pub kv: u32,
    pub reserve: u32,
    pub free: u32,
}

impl WaffleCells {
    pub fn total(&self) -> u32 {
        self.weights + self.kv + self.reserve + self.free
    }
}

/// Waffle-grid view of one GPU's capacity split.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuWaffle {
    pub gpu_id: String,
    pub weights_bytes: f64,
    pub kv_bytes: f64,
    pub reserve_bytes: f64,
    pub free_bytes: f64,
    pub grid_size: u32,
    pub total_cells: u32,
    pub cells: WaffleCells,
}

// Fixed category priority for tie-breaks, most important first.
const WEIGHTS: usize = 0;
const KV: usize = 1;
const RESERVE: usize = 2;
const FREE: usize = 3;

/// Maps four byte categories onto an n×n grid of unit cells by the largest
/// remainder (Hamilton) method.
///
/// Each category gets the floor of its proportional share; leftover cells go
/// one at a time to the largest fractional remainder, ties broken by the
/// fixed priority weights > kv > reserve > free. Non-finite or negative
/// inputs count as 0, and a zero or non-finite total puts every cell in
/// `free`. If floating-point drift makes the floors overshoot the grid,
/// cells are removed from the smallest remainder (reverse priority on ties)
/// until the sum is exact. The result always sums to `grid²`.
pub fn map_bytes_to_waffle_cells(
    weights_bytes: f64,
    kv_bytes: f64,
    reserve_bytes: f64,
    free_bytes: f64,
    grid: u32,
) -> WaffleCells {
    if grid == 0 {
        return WaffleCells::default();
    }
    let total_cells = grid * grid;

    let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
    let bytes = [
        sanitize(weights_bytes),
        sanitize(kv_bytes),
        sanitize(reserve_bytes),
        sanitize(free_bytes),
    ];
    let total: f64 = bytes.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return WaffleCells {
            free: total_cells,
            ..Default::default()
        };
    }

    let mut counts = [0u32; 4];
    let mut remainders = [0f64; 4];
    let mut assigned = 0u32;
    for i in 0..4 {
        let raw = bytes[i] / total * total_cells as f64;
        let floored = raw.floor();
        counts[i] = floored as u32;
        remainders[i] = raw - floored;
        assigned += counts[i];
    }

    // Hand out any shortfall to the largest remainders. Decrementing the
    // winner's remainder keeps later passes in remainder order when more
    // cells remain than categories.
    while assigned < total_cells {
        let mut winner = WEIGHTS;
        for i in [KV, RESERVE, FREE] {
            if remainders[i] > remainders[winner] {
                winner = i;
            }
        }
        counts[winner] += 1;
        remainders[winner] -= 1.0;
        assigned += 1;
    }

    // Floating drift can in principle push the floors past the grid; claw
    // cells back from the smallest remainders, free first on ties, never
    // below zero.
    while assigned > total_cells {
        let mut loser = None;
        for i in [FREE, RESERVE, KV, WEIGHTS] {
            if counts[i] == 0 {
                continue;
            }
            match loser {
                None => loser = Some(i),
                Some(current) => {
                    if remainders[i] < remainders[current] {
                        loser = Some(i);
                    }
                }
            }
        }
        match loser {
            Some(i) => {
                counts[i] -= 1;
                remainders[i] += 1.0;
                assigned -= 1;
            }
            None => break,
        }
    }

    WaffleCells {
        weights: counts[WEIGHTS],
        kv: counts[KV],
        reserve: counts[RESERVE],
        free: counts[FREE],
    }
}

/// Builds the waffle view for each GPU from its aggregated usage record.
pub fn build_per_gpu_waffles(usage: &[GpuUsage], grid: u32) -> Vec<GpuWaffle> {
    usage
        .iter()
        .map(|u| {
            let weights_bytes: f64 = u.parts.iter().map(|p| p.weight_bytes).sum();
            let kv_bytes: f64 = u.parts.iter().map(|p| p.kv_bytes).sum();
            let reserve_bytes = u.reserve_bytes();
            let free_bytes = u.free_bytes();
            GpuWaffle {
                gpu_id: u.gpu_id.clone(),
                weights_bytes,
                kv_bytes,
                reserve_bytes,
                free_bytes,
                grid_size: grid,
                total_cells: grid * grid,
                cells: map_bytes_to_waffle_cells(
                    weights_bytes,
                    kv_bytes,
                    reserve_bytes,
                    free_bytes,
                    grid,
                ),
            }
        })
        .collect()
}
