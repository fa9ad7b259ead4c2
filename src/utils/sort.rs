use core::mem;

/// Stable sort of a sparse (index, value) pair of arrays by index.
///
/// - Sorts by `inds` ascending
/// - Reorders `vals` accordingly
/// - Equal indices keep their original relative order
///
/// Small inputs use insertion sort, larger ones an LSD radix sort
/// (4 passes of 8 bits, each O(n + 256)).
#[inline]
pub fn sort_by_index<N: Copy + Default>(inds: &mut [u32], vals: &mut [N]) {
    assert_eq!(inds.len(), vals.len());
    let n = inds.len();
    if n <= 1 {
        return;
    }
    if is_sorted(inds) {
        return;
    }
    if n <= 32 {
        insertion_sort(inds, vals);
        return;
    }
    radix_sort(inds, vals);
}

#[inline]
fn is_sorted(inds: &[u32]) -> bool {
    inds.windows(2).all(|w| w[0] <= w[1])
}

fn radix_sort<N: Copy + Default>(inds: &mut [u32], vals: &mut [N]) {
    let n = inds.len();
    let mut inds_tmp = vec![0u32; n];
    let mut vals_tmp = vec![N::default(); n];

    let mut src_inds: &mut [u32] = inds;
    let mut src_vals: &mut [N] = vals;
    let mut dst_inds: &mut [u32] = &mut inds_tmp;
    let mut dst_vals: &mut [N] = &mut vals_tmp;

    for shift in [0u32, 8, 16, 24] {
        let mut count = [0usize; 256];
        for &k in src_inds.iter() {
            count[((k >> shift) & 0xFF) as usize] += 1;
        }

        // exclusive prefix sum -> bucket start positions
        let mut sum = 0usize;
        for c in count.iter_mut() {
            let tmp = *c;
            *c = sum;
            sum += tmp;
        }

        for idx in 0..n {
            let k = src_inds[idx];
            let b = ((k >> shift) & 0xFF) as usize;
            let pos = count[b];
            count[b] = pos + 1;
            dst_inds[pos] = k;
            dst_vals[pos] = src_vals[idx];
        }

        mem::swap(&mut src_inds, &mut dst_inds);
        mem::swap(&mut src_vals, &mut dst_vals);
    }
    // even pass count: the result already sits in the caller's buffers
}

#[inline]
fn insertion_sort<N: Copy>(inds: &mut [u32], vals: &mut [N]) {
    for i in 1..inds.len() {
        let key = inds[i];
        let val = vals[i];
        let mut j = i;
        while j > 0 && inds[j - 1] > key {
            inds[j] = inds[j - 1];
            vals[j] = vals[j - 1];
            j -= 1;
        }
        inds[j] = key;
        vals[j] = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline_stable_sort(inds: &[u32], vals: &[f64]) -> (Vec<u32>, Vec<f64>) {
        let mut pairs: Vec<(u32, usize, f64)> = inds
            .iter()
            .copied()
            .enumerate()
            .map(|(i, k)| (k, i, vals[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        pairs.into_iter().map(|(k, _, v)| (k, v)).unzip()
    }

    /// tiny deterministic PRNG (xorshift32)
    struct Rng(u32);
    impl Rng {
        fn next_u32(&mut self) -> u32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            x
        }
    }

    #[test]
    fn handles_empty_and_single() {
        let mut inds: Vec<u32> = vec![];
        let mut vals: Vec<f64> = vec![];
        sort_by_index(&mut inds, &mut vals);
        assert!(inds.is_empty());

        let mut inds = vec![42u32];
        let mut vals = vec![0.5];
        sort_by_index(&mut inds, &mut vals);
        assert_eq!(inds, vec![42]);
        assert_eq!(vals, vec![0.5]);
    }

    #[test]
    fn duplicates_keep_original_order() {
        let mut inds = vec![3u32, 1, 3, 2, 1, 3, 0];
        let mut vals: Vec<f64> = (0..inds.len()).map(|i| i as f64).collect();
        let (base_k, base_v) = baseline_stable_sort(&inds, &vals);

        sort_by_index(&mut inds, &mut vals);

        assert_eq!(inds, base_k);
        assert_eq!(vals, base_v);
    }

    #[test]
    fn matches_baseline_across_sizes() {
        let mut rng = Rng(0x1234_5678);
        for &n in &[2usize, 7, 31, 32, 33, 64, 129, 1024] {
            let mut inds = Vec::with_capacity(n);
            let mut vals = Vec::with_capacity(n);
            for i in 0..n {
                inds.push(rng.next_u32() & 0x00FF_FFFF);
                vals.push(i as f64 * 0.25);
            }
            let (base_k, base_v) = baseline_stable_sort(&inds, &vals);

            sort_by_index(&mut inds, &mut vals);

            assert_eq!(inds, base_k, "keys mismatch at n={n}");
            assert_eq!(vals, base_v, "vals mismatch at n={n}");
        }
    }
}
