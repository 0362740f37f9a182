use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_udcn::common::ndn::{Data, Interest, Name};
use rust_udcn::common::types::FaceId;
use rust_udcn::pcct::{PitInsertResult, Pcct, PcctConfig};
use std::time::Instant;

fn config(cs_capacity: usize) -> PcctConfig {
    PcctConfig {
        cs_direct_capacity: cs_capacity,
        cs_indirect_capacity: cs_capacity,
        ..PcctConfig::default()
    }
}

fn names(n: usize) -> Vec<Name> {
    (0..n).map(|i| Name::from_string(&format!("/bench/{}", i))).collect()
}

/// Interest miss followed by Data insertion, with FIFO eviction at steady state.
fn bench_interest_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("interest_data");
    let content = Bytes::from(vec![0u8; 100]);

    for &capacity in &[64, 1024, 16384] {
        let names = names(capacity * 2);
        group.bench_with_input(BenchmarkId::new("cycle", capacity), &names, |b, names| {
            let mut pcct = Pcct::new(&config(capacity));
            let mut i = 0;
            b.iter(|| {
                let name = &names[i % names.len()];
                i += 1;
                let interest = Interest::new(name.clone());
                if let Ok(PitInsertResult::Created { token, .. }) =
                    pcct.insert_interest(&interest, FaceId(1), Instant::now())
                {
                    let data = Data::new(name.clone(), content.clone());
                    let found = pcct.find_by_data(&data, Some(token));
                    black_box(pcct.insert_data(data, &found));
                }
            });
        });
    }

    group.finish();
}

/// Interests answered from the content store.
fn bench_cs_hit(c: &mut Criterion) {
    let names = names(1024);
    let mut pcct = Pcct::new(&config(names.len()));
    for name in &names {
        let interest = Interest::new(name.clone());
        if let Ok(PitInsertResult::Created { token, .. }) =
            pcct.insert_interest(&interest, FaceId(1), Instant::now())
        {
            let data = Data::new(name.clone(), Bytes::from_static(b"cached"));
            let found = pcct.find_by_data(&data, Some(token));
            pcct.insert_data(data, &found);
        }
    }
    let interests: Vec<Interest> = names.into_iter().map(Interest::new).collect();

    c.bench_function("cs_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            let interest = &interests[i % interests.len()];
            i += 1;
            if let Ok(PitInsertResult::CsHit { entry }) =
                pcct.insert_interest(interest, FaceId(2), Instant::now())
            {
                black_box(pcct.cs_hit(entry));
            }
        });
    });
}

criterion_group!(benches, bench_interest_data, bench_cs_hit);
criterion_main!(benches);
