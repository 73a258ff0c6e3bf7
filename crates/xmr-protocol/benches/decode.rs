//! Benchmarks for inbound frame decoding.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xmr_protocol::{decode, encode, OutboundFrame};

fn bench_decode(c: &mut Criterion) {
    let now = Utc::now();
    let created = now.to_rfc3339();

    let collect = format!(r#"{{"action":"collectNow","createdDt":"{created}","ttl":60}}"#);
    let status = format!(
        r#"{{"action":"commandAction","createdDt":"{created}","ttl":60,"commandCode":"showStatusWindow|45"}}"#
    );
    let criteria = format!(
        r#"{{"action":"criteriaUpdate","createdDt":"{created}","ttl":60,"criteriaUpdates":[{{"metric":"temp","value":"20","ttl":60}},{{"metric":"humidity","value":"40","ttl":60}}]}}"#
    );

    let mut group = c.benchmark_group("decode");

    group.bench_function("heartbeat", |b| b.iter(|| decode(black_box("H"), now)));
    group.bench_function("collect_now", |b| b.iter(|| decode(black_box(&collect), now)));
    group.bench_function("show_status_window", |b| {
        b.iter(|| decode(black_box(&status), now))
    });
    group.bench_function("criteria_update", |b| {
        b.iter(|| decode(black_box(&criteria), now))
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let frame = OutboundFrame::init(Some("cms-key".into()), "player-channel");

    c.bench_function("encode_init", |b| b.iter(|| encode(black_box(&frame))));
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
