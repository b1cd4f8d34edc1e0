//! Slot write/read latency.

use criterion::{Criterion, criterion_group, criterion_main};
use hub_shared_memory::SharedSlot;
use std::hint::black_box;

fn bench_slot(c: &mut Criterion) {
    let mut slot = match SharedSlot::in_memory("bench", 10) {
        Ok(slot) => slot,
        Err(e) => panic!("slot creation failed: {e}"),
    };
    let record = [0x30u8, 2, 210, 0, 60, 0, 90, 0, 25, 0];

    c.bench_function("slot_write_10b", |b| {
        b.iter(|| slot.write(black_box(&record)))
    });

    let mut out = [0u8; 10];
    c.bench_function("slot_read_into_10b", |b| {
        b.iter(|| slot.read_into(black_box(&mut out)))
    });
}

criterion_group!(benches, bench_slot);
criterion_main!(benches);
