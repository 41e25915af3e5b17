use std::collections::VecDeque;
use std::hint::black_box;
use std::time::Duration;

/// Buffers kept alive per worker, so that heap profiles show live memory.
const RETAINED_BUFFERS: usize = 64;

/// Starts `threads` detached workers that sort, hash and allocate forever.
pub fn spawn(threads: usize) -> anyhow::Result<()> {
    for (worker, seed) in (0..threads).zip(0_u64..) {
        std::thread::Builder::new()
            .name(format!("workload-{worker}"))
            .spawn(move || run(seed))?;
    }
    if threads > 0 {
        tracing::info!("Started {threads} workload threads");
    }
    Ok(())
}

fn run(seed: u64) -> ! {
    let mut retained = VecDeque::with_capacity(RETAINED_BUFFERS);
    let mut state = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    loop {
        let mut values = (0..20_000)
            .map(|_| {
                state = xorshift(state);
                state
            })
            .collect::<Vec<_>>();
        values.sort_unstable();
        black_box(checksum(&values));

        if retained.len() == RETAINED_BUFFERS {
            retained.pop_front();
        }
        retained.push_back(values);
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn xorshift(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

fn checksum(values: &[u64]) -> u64 {
    values
        .iter()
        .fold(0, |acc, value| acc.rotate_left(5) ^ value.wrapping_mul(31))
}
